//! The shared response cache: a fixed-capacity, concurrently-accessed,
//! approximately-LRU store keyed by the literal request target.
use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::debug;

/// Default total byte budget across all live entries.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1_049_000;
/// Default per-entry byte ceiling for admission.
pub const DEFAULT_MAX_OBJECT_SIZE: usize = 102_400;

/// The map itself is never allowed to evict by entry count; eviction is
/// driven entirely by the byte budget in `Inner::evict_to_fit`. This cap
/// just keeps the underlying `lru` crate from needing an unbounded
/// allocation up front.
const MAP_CAPACITY_ENTRIES: usize = 1_000_000;

struct Inner {
    entries: LruCache<Bytes, Bytes>,
    used: usize,
}

/// A fixed-capacity, concurrently-accessed, approximately-LRU response
/// cache. Constructed once and shared across worker tasks via
/// `Arc<CacheStore>`.
pub struct CacheStore {
    inner: RwLock<Inner>,
    capacity: usize,
    max_object: usize,
}

impl CacheStore {
    /// Establishes a cache with the given byte budgets. Call once at
    /// process start and share the result via `Arc`.
    pub fn new(capacity: usize, max_object: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: LruCache::new(
                    NonZeroUsize::new(MAP_CAPACITY_ENTRIES).expect("capacity is non-zero"),
                ),
                used: 0,
            }),
            capacity,
            max_object,
        }
    }

    /// Looks up `key`. On hit, promotes the entry to rank 0 and returns a
    /// cheap clone of the stored bytes (a `Bytes` clone is a refcount
    /// bump, not a copy, so the caller never holds the guard during I/O).
    pub async fn lookup(&self, key: &[u8]) -> Option<Bytes> {
        let mut inner = self.inner.write().await;
        let value = inner.entries.get(key).cloned();
        if value.is_some() {
            debug!(bytes = key.len(), "cache hit");
        }
        value
    }

    /// Offers `(key, value)` for storage. Oversize buffers are silently
    /// rejected. If `key` already has a live entry, it is promoted and
    /// its value is left untouched (admission races are benign: the
    /// first writer's payload wins). Otherwise least-recently-used
    /// entries are evicted until the new entry fits, then it is inserted
    /// at rank 0.
    ///
    /// Returns whether the value was (or already was) stored.
    pub async fn admit(&self, key: Bytes, value: Bytes) -> bool {
        if value.len() > self.max_object {
            return false;
        }

        let mut inner = self.inner.write().await;

        if inner.entries.contains(&key) {
            inner.entries.promote(&key);
            return true;
        }

        inner.evict_to_fit(self.capacity, value.len());

        inner.used += value.len();
        inner.entries.put(key, value);
        true
    }

    /// Evicts every entry and releases the cache's resources.
    /// Operations after `shutdown` are unspecified.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.used = 0;
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn used(&self) -> usize {
        self.inner.read().await.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_object(&self) -> usize {
        self.max_object
    }
}

impl Inner {
    fn evict_to_fit(&mut self, capacity: usize, incoming: usize) {
        while self.used + incoming > capacity {
            match self.entries.pop_lru() {
                Some((_, evicted)) => {
                    self.used -= evicted.len();
                }
                None => break,
            }
        }
    }
}
