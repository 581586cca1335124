use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::{Cache, CacheResult};

/// Cache that never holds anything, so every read recomputes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> BoxFuture<'static, CacheResult<Option<Value>>> {
        async { Ok(None) }.boxed()
    }

    fn set(
        &self,
        _key: &str,
        _value: Value,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'static, CacheResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn delete(&self, _key: &str) -> BoxFuture<'static, CacheResult<()>> {
        async { Ok(()) }.boxed()
    }
}
