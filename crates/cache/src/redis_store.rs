//! Redis backend for deployments where several replicas should share one
//! cache. Failures degrade to cache misses; the cache is never on the
//! request's critical correctness path.

use {
    crate::Storage,
    redis::AsyncCommands,
    std::time::Duration,
};

pub struct RedisStorage {
    connection: redis::aio::ConnectionManager,
}

impl RedisStorage {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl Storage for RedisStorage {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut connection = self.connection.clone();
        match connection.get::<_, Option<Vec<u8>>>(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(?err, "redis get failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut connection = self.connection.clone();
        let ttl_ms = ttl.as_millis().min(u128::from(u64::MAX)) as u64;
        let result = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut connection)
            .await;
        if let Err(err) = result {
            tracing::warn!(?err, "redis set failed, entry not cached");
        }
    }
}
