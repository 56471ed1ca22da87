//! In-process backend on `moka` with per-entry expiration.

use {
    crate::Storage,
    moka::{Expiry, future::Cache},
    std::time::{Duration, Instant},
};

#[derive(Clone)]
struct Entry {
    bytes: Vec<u8>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct MemoryStorage {
    cache: Cache<String, Entry>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(100_000)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await.map(|entry| entry.bytes)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.cache
            .insert(key.to_owned(), Entry { bytes: value, ttl })
            .await;
    }
}
