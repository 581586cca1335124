use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use super::{Cache, CacheResult};

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Bounded in-process cache for single-node deployments.
///
/// Entries are kept in insertion order. Once the capacity is exceeded the oldest tenth is
/// dropped regardless of use; expiry is only checked when a key is read.
pub struct MemoryCache {
    entries: Mutex<IndexMap<String, Entry>>,
    capacity: usize,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.shift_remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn store(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

        let mut entries = self.entries();
        // Re-inserting moves the key to the back of the eviction queue.
        entries.shift_remove(key);
        entries.insert(key.to_string(), Entry { value, expires_at });

        if entries.len() > self.capacity {
            let evict = (self.capacity / 10).max(1);
            entries.drain(..evict);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> BoxFuture<'static, CacheResult<Option<Value>>> {
        let value = self.lookup(key);
        async move { Ok(value) }.boxed()
    }

    fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> BoxFuture<'static, CacheResult<()>> {
        self.store(key, value, ttl);
        async { Ok(()) }.boxed()
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, CacheResult<()>> {
        self.entries().shift_remove(key);
        async { Ok(()) }.boxed()
    }
}
