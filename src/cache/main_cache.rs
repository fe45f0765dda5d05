//! Guarded cache holder used by a group.

use std::sync::Arc;

use parking_lot::Mutex;

use super::byteview::ByteView;
use super::lru::LruCache;
use super::metrics::GroupStats;

/// Mutex-protected LRU of [`ByteView`]s.
///
/// An LRU lookup reorders the recency list, so every access takes the
/// exclusive lock. Values are cloned out (a refcount bump) before the lock
/// is released.
pub struct MainCache {
    lru: Mutex<LruCache<ByteView>>,
}

impl MainCache {
    /// Create a holder of `cache_bytes` capacity whose evictions are
    /// counted in `stats`.
    pub fn new(cache_bytes: u64, stats: Arc<GroupStats>) -> Self {
        let lru = LruCache::<ByteView>::with_eviction_callback(
            cache_bytes,
            Box::new(move |_key: String, _value: ByteView| stats.record_eviction()),
        );
        Self {
            lru: Mutex::new(lru),
        }
    }

    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.lru.lock().get(key).cloned()
    }

    pub fn add(&self, key: &str, value: ByteView) {
        self.lru.lock().add(key, value);
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.lru.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lru.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.lock().is_empty()
    }

    /// Bytes accounted to cached entries
    pub fn bytes(&self) -> u64 {
        self.lru.lock().used_bytes()
    }

    /// Capacity in bytes (0 = unbounded)
    pub fn capacity(&self) -> u64 {
        self.lru.lock().max_bytes()
    }
}
