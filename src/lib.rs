//! meshcache - Peer-Distributed Read-Through Cache
//!
//! Each node keeps a byte-bounded LRU cache per named group. On a miss the
//! key's owner is found on a consistent hash ring: keys owned by another
//! node are fetched from that peer, keys owned locally are loaded from the
//! group's data source and cached. Concurrent misses for the same key are
//! collapsed into one load.
//!
//! # Architecture
//!
//! ```text
//! Group::get ─▶ MainCache (LRU) ─miss─▶ Flight (singleflight)
//!                                          │
//!                     PeerPicker (HashRing) ─▶ PeerGetter (HTTP)
//!                                          │ self / failure
//!                                          ▼
//!                                   Getter (data source)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Peer transports implementing domain ports
//! - [`cache`] - Byte views, LRU eviction cache and group statistics
//! - [`config`] - Node configuration
//! - [`domain`] - Ports (data source and peer traits)
//! - [`error`] - Error types
//! - [`group`] - Group orchestrator and registry
//! - [`hashring`] - Consistent hash ring
//! - [`metrics`] - Prometheus exporter
//! - [`server`] - HTTP servers (peer, API, health)
//! - [`singleflight`] - Duplicate call suppression

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod group;
pub mod hashring;
pub mod metrics;
pub mod server;
pub mod singleflight;

// Re-export commonly used types
pub use adapters::{HttpPool, InMemoryPeers, NoPeers, PoolConfig};
pub use cache::{ByteView, GroupStatsSnapshot, LruCache};
pub use config::NodeConfig;
pub use domain::{Getter, GetterFn, PeerGetter, PeerPicker};
pub use error::{Error, Result};
pub use group::{Group, GroupRegistry};
pub use hashring::HashRing;
pub use singleflight::Flight;

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
