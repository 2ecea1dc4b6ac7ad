//! Short-key URL store with a standalone and a caching proxy mode.
//!
//! A standalone store keeps its map in memory and appends every new entry to
//! a data file, replaying that file on startup. A proxy keeps a local cache
//! and sends every write, and every cache miss, to a master over RPC.
//!
//! - [`store`] holds the concurrent map, key assignment, and the [`Store`]
//!   contract every variant implements.
//! - [`persist`] replays the data file and runs the background writer.
//! - [`record`] is the on-disk record codec.
//! - [`keygen`] turns an index into a short base-62 key.
//! - [`proxy`] composes a local cache with a remote master.
//! - [`message`], [`server`] and [`client`] carry the `Store.Get` and
//!   `Store.Put` procedures over a JSON line protocol on TCP.
//! - [`http`] exposes the add form and key redirects.
//! - [`cli`] parses the process configuration.

pub mod cli;
pub mod client;
pub mod error;
pub mod http;
pub mod keygen;
pub mod message;
pub mod persist;
pub mod proxy;
pub mod record;
pub mod server;
pub mod store;

pub use error::{Result, StoreError};
pub use proxy::ProxyStore;
pub use store::{KeyValueStore, Store};
