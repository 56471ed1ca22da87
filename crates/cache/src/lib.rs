//! TTL key-value cache with pluggable backends.
//!
//! Two backends are supported: an in-process [`moka`] cache and a Redis
//! store for deployments with several replicas. Values are stored as JSON;
//! keys are built deterministically with [`Key`] so identical call sites
//! hash to identical entries across processes. Backends provide their own
//! atomicity; concurrent misses are not deduplicated (the TTLs involved are
//! short enough to bound any stampede).

pub mod key;
mod memory;
mod redis_store;

pub use {key::Key, memory::MemoryStorage, redis_store::RedisStorage};

use {
    serde::{Serialize, de::DeserializeOwned},
    std::{future::Future, sync::Arc, time::Duration},
};

/// Backend contract: byte-valued get/set with a per-entry TTL.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// Typed facade over a [`Storage`] backend.
#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn Storage>,
}

impl Cache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &Key) -> Option<T> {
        let bytes = self.storage.get(&key.digest()).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                // A decode failure means the stored shape changed; treat it
                // as a miss and let the caller overwrite.
                tracing::warn!(?err, key = %key, "discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &Key, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.storage.set(&key.digest(), bytes, ttl).await,
            Err(err) => tracing::error!(?err, key = %key, "failed to encode cache entry"),
        }
    }

    /// Memoizes a fallible computation: on a hit the stored value is
    /// returned, on a miss `compute` runs and its success is stored for
    /// `ttl`. Errors are never cached.
    pub async fn memoize<T, E, F, Fut>(&self, key: Key, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }
        let value = compute().await?;
        self.put(&key, &value, ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::sync::atomic::{AtomicUsize, Ordering}};

    #[tokio::test]
    async fn memoize_computes_once_within_ttl() {
        let cache = Cache::in_memory();
        let calls = AtomicUsize::new(0);
        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(42u64)
        };
        let key = Key::new("test::answer").arg(&1u64);
        let first = cache
            .memoize(key.clone(), Duration::from_secs(30), compute)
            .await
            .unwrap();
        let second = cache
            .memoize(key, Duration::from_secs(30), compute)
            .await
            .unwrap();
        assert_eq!((first, second), (42, 42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memoize_does_not_cache_errors() {
        let cache = Cache::in_memory();
        let calls = AtomicUsize::new(0);
        let key = Key::new("test::flaky");
        let failing = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u64, &str>("boom")
        };
        assert!(cache
            .memoize(key.clone(), Duration::from_secs(30), failing)
            .await
            .is_err());
        assert!(cache
            .memoize(key, Duration::from_secs(30), failing)
            .await
            .is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = Cache::in_memory();
        let key = Key::new("test::ttl");
        cache.put(&key, &7u64, Duration::from_millis(30)).await;
        assert_eq!(cache.get::<u64>(&key).await, Some(7));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get::<u64>(&key).await, None);
    }
}
