//! Local Cache Layer
//!
//! Byte-bounded LRU storage for one group's locally sourced values.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 MainCache                     │
//! │   Mutex ──▶ LruCache<ByteView>                │
//! │               │  slot list (MRU → LRU)        │
//! │               │  key → slot index             │
//! │               └─ on_evicted ──▶ GroupStats    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Remote-origin values never enter this layer; the owning peer caches them.

mod byteview;
pub mod lru;
mod main_cache;
mod metrics;
mod proptest;

pub use byteview::ByteView;
pub use lru::{ByteSize, LruCache, OnEvicted};
pub use main_cache::MainCache;
pub use metrics::{GroupStats, GroupStatsSnapshot};

/// Default local cache capacity (2KB, the demo node's budget)
pub const DEFAULT_CACHE_BYTES: u64 = 2 << 10;

// =============================================================================
// Tests
// =============================================================================
