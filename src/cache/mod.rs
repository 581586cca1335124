//! Short-lived read cache used to memoize room aggregations.
//!
//! Values are stored as JSON so every backend can hold any serializable result. Entries are
//! replaced whole on write and never mutated in place.

mod memory;
mod noop;
#[cfg(feature = "redis-cache")]
mod redis;

use std::{future::Future, time::Duration};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use self::memory::MemoryCache;
pub use self::noop::NoopCache;
#[cfg(feature = "redis-cache")]
pub use self::redis::RedisCache;

/// Result alias for cache backend operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Failure reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("cache value could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Key/value store with per-entry time-to-live.
///
/// `ttl` of `None` uses the backend's configured default; `Some(Duration::ZERO)` keeps the
/// entry until it is deleted or evicted.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, CacheResult<Option<Value>>>;
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>)
    -> BoxFuture<'static, CacheResult<()>>;
    fn delete(&self, key: &str) -> BoxFuture<'static, CacheResult<()>>;
}

/// Read-through helper available on every [`Cache`].
pub trait CacheExt: Cache {
    /// Serve `key` from the cache or compute, store and return it.
    ///
    /// `compute` runs at most once per call and only on a miss. Concurrent misses on the
    /// same key each compute their own value. Backend failures degrade to a miss and are
    /// logged; errors from `compute` are returned untouched and nothing is stored.
    /// Wrapped values always expire: a zero `ttl` computes without storing.
    fn wrap<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Serialize + DeserializeOwned + Send,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        async move {
            match self.get(key).await {
                Ok(Some(value)) => match serde_json::from_value::<T>(value) {
                    Ok(hit) => return Ok(hit),
                    Err(err) => warn!(key, error = %err, "discarding undecodable cache entry"),
                },
                Ok(None) => {}
                Err(err) => warn!(key, error = %err, "cache read failed; computing value"),
            }

            let fresh = compute().await?;
            if ttl.is_zero() {
                warn!(key, "zero ttl passed to wrap; value not cached");
                return Ok(fresh);
            }
            match serde_json::to_value(&fresh) {
                Ok(value) => {
                    if let Err(err) = self.set(key, value, Some(ttl)).await {
                        warn!(key, error = %err, "cache write failed");
                    }
                }
                Err(err) => warn!(key, error = %err, "failed to encode value for cache"),
            }
            Ok(fresh)
        }
    }

    /// Delete every key in `keys`, logging failures instead of returning them.
    fn invalidate(&self, keys: &[String]) -> impl Future<Output = ()> + Send {
        async move {
            for key in keys {
                if let Err(err) = self.delete(key).await {
                    warn!(key = %key, error = %err, "cache invalidation failed");
                }
            }
        }
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Key of the cached issue listing of a room.
pub fn room_issues_key(room_id: Uuid) -> String {
    format!("room:{room_id}:issues")
}

/// Key of the cached leaderboard of a room.
pub fn room_leaderboard_key(room_id: Uuid) -> String {
    format!("room:{room_id}:leaderboard")
}

