//! The key-value store and the contract shared by every store variant.

use std::{
    collections::{HashMap, hash_map::Entry},
    path::Path,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{Result, StoreError},
    keygen::gen_key,
    persist::{self, SaveQueue},
    record::Record,
};

/// Operations exposed to HTTP handlers and remote callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Looks up the value stored under `key`.
    async fn get(&self, key: &str) -> Result<String>;

    /// Stores `value` under a freshly generated key and returns the key.
    async fn put(&self, value: String) -> Result<String>;
}

/// Concurrent in-memory map with optional append-only persistence.
///
/// Reads share a reader/writer lock; inserts take it exclusively. A key,
/// once present, is never overwritten.
#[derive(Default)]
pub struct KeyValueStore {
    entries: RwLock<HashMap<String, String>>,
    save: Option<SaveQueue>,
}

impl KeyValueStore {
    /// Creates a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a store backed by the data file at `path`.
    ///
    /// The file is replayed before this returns; a missing file starts an
    /// empty store. An empty path disables persistence.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(Self::in_memory());
        }

        let mut store = Self::in_memory();
        persist::load(path, &store).await?;
        store.save = Some(SaveQueue::start(path.to_path_buf()).await?);
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Result<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Inserts `value` under `key` unless the key is already taken.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(key.into()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value.into());
                Ok(())
            }
        }
    }

    /// Number of entries. May already be stale when the caller uses it.
    pub fn count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stores `value` under the first free generated key and returns it.
    ///
    /// The key is seeded from [`count`](Self::count) and the insert is
    /// retried on collision. Seed and insert are not atomic together, so
    /// concurrent callers may collide; every collision moves to a different
    /// seed, which guarantees progress but not key order.
    pub async fn put(&self, value: String) -> Result<String> {
        let mut seed = self.count();
        let key = loop {
            let candidate = gen_key(seed);
            match self.set(candidate.clone(), value.clone()) {
                Ok(()) => break candidate,
                Err(StoreError::AlreadyExists(_)) => {
                    let count = self.count();
                    debug!(key = %candidate, count, "key collision, retrying");
                    seed = if count > seed { count } else { seed + 1 };
                }
                Err(err) => return Err(err),
            }
        };

        if let Some(save) = &self.save {
            save.enqueue(Record::new(key.clone(), value)).await;
        }

        Ok(key)
    }

    /// Stops persistence after every queued record has been written.
    ///
    /// Later `put` calls still succeed in memory but are not persisted.
    pub async fn shutdown(&self) {
        if let Some(save) = &self.save {
            save.close().await;
        }
    }
}

#[async_trait]
impl Store for KeyValueStore {
    async fn get(&self, key: &str) -> Result<String> {
        KeyValueStore::get(self, key)
    }

    async fn put(&self, value: String) -> Result<String> {
        KeyValueStore::put(self, value).await
    }
}
