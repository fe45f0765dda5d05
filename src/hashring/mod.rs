//! Consistent Hash Ring
//!
//! Maps a key to one member of a peer set. Every peer is placed on the ring
//! `replicas` times (virtual nodes) to smooth the key distribution.
//!
//! # Design
//!
//! ```text
//!   hash(key) ──▶ first virtual node with hash >= hash(key)
//!                 (past the last node: wrap to index 0)
//!                           │
//!                           ▼
//!                 virtual hash ──▶ peer name
//! ```
//!
//! The ring is never patched peer by peer. Owners rebuild it wholesale from
//! the full peer list whenever membership changes.

use std::collections::HashMap;

/// Hash function placing keys and virtual nodes on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Default virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

/// Consistent hash ring with virtual nodes.
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node hashes (duplicates kept)
    keys: Vec<u32>,
    /// Virtual node hash → peer name
    hash_map: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring. `hash` defaults to IEEE CRC32.
    ///
    /// `replicas` is clamped to at least one virtual node per peer.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(crc32fast::hash),
            replicas: replicas.max(1),
            keys: Vec::new(),
            hash_map: HashMap::new(),
        }
    }

    /// Build a ring holding exactly `peers`.
    pub fn with_peers<I, S>(replicas: usize, hash: Option<HashFn>, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = Self::new(replicas, hash);
        ring.add(peers);
        ring
    }

    /// Place every peer on the ring `replicas` times.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, peer).as_bytes());
                self.keys.push(hash);
                self.hash_map.insert(hash, peer.to_string());
            }
        }
        self.keys.sort_unstable();
    }

    /// Owning peer for `key`, or `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() || key.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&h| h < hash);
        let vnode = self.keys[idx % self.keys.len()];

        self.hash_map.get(&vnode).map(String::as_str)
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, None)
    }
}

// =============================================================================
// Tests
// =============================================================================
