//! Byte-bounded LRU cache
//!
//! The only component that mutates cached contents.
//!
//! # Design
//!
//! - Slot vector + free list holding a doubly linked recency list
//!   (head = most recently used, tail = least recently used)
//! - `HashMap` from key to slot index for O(1) lookup
//! - Capacity is measured in bytes: `key.len() + value.byte_len()` per entry
//!
//! The cache does no locking of its own. `get` rewrites the recency order,
//! so owners sharing a cache across threads must take an exclusive lock for
//! reads as well as writes (see [`MainCache`](super::MainCache)).

use std::collections::HashMap;
use std::fmt;

/// Size accounting for cached values.
pub trait ByteSize {
    /// Number of bytes the value occupies in the cache.
    fn byte_len(&self) -> usize;
}

impl ByteSize for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSize for bytes::Bytes {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with every evicted entry.
///
/// It runs after the entry has been unlinked, while the owner still holds
/// `&mut` access to the cache. It must not call back into the same cache:
/// owners keep the cache behind a non-reentrant lock, so re-entry deadlocks.
pub type OnEvicted<V> = Box<dyn FnMut(String, V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Byte-bounded least-recently-used cache.
pub struct LruCache<V> {
    /// Capacity in bytes, 0 = unbounded
    max_bytes: u64,
    /// Sum of `key.len() + value.byte_len()` over present entries
    used_bytes: u64,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<OnEvicted<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Create a cache holding at most `max_bytes` bytes (0 = unbounded).
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Create a cache that reports evictions to `on_evicted`.
    pub fn with_eviction_callback(max_bytes: u64, on_evicted: OnEvicted<V>) -> Self {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(on_evicted);
        cache
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace `key`, then evict until back under capacity.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.slots[idx].as_mut() {
                let old_len = node.value.byte_len() as u64;
                self.used_bytes = self.used_bytes - old_len + value.byte_len() as u64;
                node.value = value;
            }
            self.move_to_front(idx);
        } else {
            self.used_bytes += (key.len() + value.byte_len()) as u64;
            let idx = self.push_front(key.clone(), value);
            self.index.insert(key, idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if !self.remove_oldest() {
                break;
            }
        }
    }

    /// Evict the least recently used entry, returning false on an empty cache.
    ///
    /// The eviction callback, if any, sees the entry only after it has been
    /// removed from every internal structure.
    pub fn remove_oldest(&mut self) -> bool {
        let Some((key, value)) = self.pop_oldest() else {
            return false;
        };
        if let Some(callback) = self.on_evicted.as_mut() {
            callback(key, value);
        }
        true
    }

    fn pop_oldest(&mut self) -> Option<(String, V)> {
        let idx = self.tail?;
        let node = self.unlink(idx)?;
        self.index.remove(&node.key);
        self.used_bytes -= (node.key.len() + node.value.byte_len()) as u64;
        Some((node.key, node.value))
    }

    /// Remove `key` without invoking the eviction callback.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.index.remove(key)?;
        let node = self.unlink(idx)?;
        self.used_bytes -= (node.key.len() + node.value.byte_len()) as u64;
        Some(node.value)
    }

    /// Check presence without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently accounted to entries
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Capacity in bytes (0 = unbounded)
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Keys ordered from most to least recently used.
    pub fn keys_mru(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].as_ref() {
                Some(node) => {
                    keys.push(node.key.as_str());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    fn push_front(&mut self, key: String, value: V) -> usize {
        let node = Node {
            key,
            value,
            prev: None,
            next: self.head,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(old_head) = self.head {
            if let Some(head) = self.slots[old_head].as_mut() {
                head.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        idx
    }

    /// Detach slot `idx` from the list and free it.
    fn unlink(&mut self, idx: usize) -> Option<Node<V>> {
        let node = self.slots[idx].take()?;
        self.detach(idx, node.prev, node.next);
        self.free.push(idx);
        Some(node)
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        self.detach(idx, prev, next);

        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head {
            if let Some(head) = self.slots[old_head].as_mut() {
                head.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn detach(&mut self, idx: usize, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None if self.head == Some(idx) => self.head = next,
            None => {}
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None if self.tail == Some(idx) => self.tail = prev,
            None => {}
        }
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
