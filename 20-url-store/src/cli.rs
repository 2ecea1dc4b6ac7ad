use std::net::SocketAddr;

use clap::Parser;

/// Process configuration, parsed once at startup.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Short-key URL store with an optional caching proxy mode", long_about = None)]
pub struct Cli {
    /// Address the HTTP front end listens on.
    #[arg(long = "http", default_value = "0.0.0.0:8080")]
    pub http_listen: SocketAddr,

    /// Data file for the store. An empty value disables persistence.
    #[arg(long, default_value = "store.json")]
    pub file: String,

    /// Host name and port used in the links handed back to clients.
    #[arg(long, default_value = "localhost:8080")]
    pub host: String,

    /// Run as a caching proxy of the master at this address. `--file` is ignored.
    #[arg(long)]
    pub master: Option<String>,

    /// Expose the store to proxies over RPC.
    #[arg(long)]
    pub rpc: bool,

    /// Address the RPC listener binds to when `--rpc` is set.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub rpc_listen: SocketAddr,
}
