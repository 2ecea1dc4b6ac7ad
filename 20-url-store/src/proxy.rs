//! A store that delegates to a remote master and caches what it sees.

use async_trait::async_trait;
use tracing::debug;

use crate::{
    client::RpcClient,
    error::Result,
    store::{KeyValueStore, Store},
};

/// Read-through, write-through cache in front of a master store.
///
/// The master generates every key. Cached entries are never evicted or
/// refreshed, so a proxy does not observe later changes at the master.
pub struct ProxyStore<M = RpcClient> {
    cache: KeyValueStore,
    master: M,
}

impl ProxyStore<RpcClient> {
    /// Connects to the master at `addr`.
    pub async fn connect(addr: &str) -> Result<Self> {
        let master = RpcClient::connect(addr).await?;
        Ok(Self::new(master))
    }

    /// Closes the connection to the master.
    pub async fn shutdown(&self) {
        self.master.shutdown().await;
    }
}

impl<M: Store> ProxyStore<M> {
    pub fn new(master: M) -> Self {
        Self {
            cache: KeyValueStore::in_memory(),
            master,
        }
    }

    /// Number of entries currently cached.
    pub fn cached(&self) -> usize {
        self.cache.count()
    }

    fn populate(&self, key: &str, value: &str) {
        // Losing a race with another populate leaves the same entry behind.
        if let Err(err) = self.cache.set(key, value) {
            debug!(key, error = %err, "cache already populated");
        }
    }
}

#[async_trait]
impl<M: Store> Store for ProxyStore<M> {
    async fn get(&self, key: &str) -> Result<String> {
        if let Ok(value) = self.cache.get(key) {
            return Ok(value);
        }

        let value = self.master.get(key).await?;
        self.populate(key, &value);
        Ok(value)
    }

    async fn put(&self, value: String) -> Result<String> {
        let key = self.master.put(value.clone()).await?;
        self.populate(&key, &value);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use super::*;
    use crate::error::StoreError;

    /// Master double that counts calls and can be taken offline.
    #[derive(Default)]
    struct MockMaster {
        inner: KeyValueStore,
        next_key: Option<String>,
        calls: AtomicUsize,
        offline: AtomicBool,
    }

    impl MockMaster {
        fn with_key(key: &str) -> Self {
            Self {
                next_key: Some(key.to_string()),
                ..Self::default()
            }
        }

        fn check_online(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Remote("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Store for Arc<MockMaster> {
        async fn get(&self, key: &str) -> Result<String> {
            self.check_online()?;
            self.inner.get(key)
        }

        async fn put(&self, value: String) -> Result<String> {
            self.check_online()?;
            match &self.next_key {
                Some(key) => {
                    self.inner.set(key.clone(), value)?;
                    Ok(key.clone())
                }
                None => self.inner.put(value).await,
            }
        }
    }

    #[tokio::test]
    async fn put_delegates_and_caches() {
        let master = Arc::new(MockMaster::with_key("x1"));
        let proxy = ProxyStore::new(Arc::clone(&master));

        let key = proxy.put("http://b".into()).await.expect("put");
        assert_eq!(key, "x1");
        assert_eq!(master.calls.load(Ordering::SeqCst), 1);

        assert_eq!(proxy.get("x1").await.expect("get"), "http://b");
        assert_eq!(master.calls.load(Ordering::SeqCst), 1, "cached get must not call master");
    }

    #[tokio::test]
    async fn cached_get_survives_master_outage() {
        let master = Arc::new(MockMaster::default());
        master.inner.set("k", "http://c").expect("seed master");
        let proxy = ProxyStore::new(Arc::clone(&master));

        assert_eq!(proxy.get("k").await.expect("first get"), "http://c");
        assert_eq!(proxy.cached(), 1);

        master.offline.store(true, Ordering::SeqCst);
        assert_eq!(proxy.get("k").await.expect("second get"), "http://c");
        assert_eq!(master.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn master_not_found_is_surfaced() {
        let master = Arc::new(MockMaster::default());
        let proxy = ProxyStore::new(Arc::clone(&master));

        let result = proxy.get("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound(key)) if key == "missing"));
        assert_eq!(proxy.cached(), 0);
    }

    #[tokio::test]
    async fn failed_put_leaves_cache_untouched() {
        let master = Arc::new(MockMaster::default());
        master.offline.store(true, Ordering::SeqCst);
        let proxy = ProxyStore::new(Arc::clone(&master));

        let result = proxy.put("http://d".into()).await;
        assert!(matches!(result, Err(StoreError::Remote(_))));
        assert_eq!(proxy.cached(), 0);
    }
}
