use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use redis::AsyncCommands;
use serde_json::Value;

use super::{Cache, CacheError, CacheResult};

/// Cache shared between processes through a Redis server.
///
/// Values are stored as JSON text under `{prefix}:{key}`; Redis handles expiry.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    prefix: Arc<str>,
    default_ttl: Duration,
}

impl RedisCache {
    pub fn new(url: &str, prefix: &str, default_ttl: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            prefix: Arc::from(prefix),
            default_ttl,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    async fn connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

impl Cache for RedisCache {
    fn get(&self, key: &str) -> BoxFuture<'static, CacheResult<Option<Value>>> {
        let cache = self.clone();
        let key = self.namespaced(key);
        Box::pin(async move {
            let mut conn = cache.connection().await?;
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            raw.map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(Into::into)
        })
    }

    fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> BoxFuture<'static, CacheResult<()>> {
        let cache = self.clone();
        let key = self.namespaced(key);
        let ttl = ttl.unwrap_or(self.default_ttl);
        Box::pin(async move {
            let payload = serde_json::to_string(&value)?;
            let mut conn = cache.connection().await?;
            let written: redis::RedisResult<()> = if ttl.is_zero() {
                conn.set(&key, payload).await
            } else {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                conn.pset_ex(&key, payload, millis).await
            };
            written.map_err(|e| CacheError::Backend(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, CacheResult<()>> {
        let cache = self.clone();
        let key = self.namespaced(key);
        Box::pin(async move {
            let mut conn = cache.connection().await?;
            let _removed: i64 = conn
                .del(&key)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            Ok(())
        })
    }
}
