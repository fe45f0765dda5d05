//! Infrastructure Adapters
//!
//! Implementations of the [`domain::ports`](crate::domain::ports) traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │              PeerPicker │ PeerGetter                        │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ HttpPool / HttpGetter  │ InMemoryPeers / RegistryPeer      │ │
//! │  │ NoPeers                                                    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use meshcache::adapters::{HttpPool, PoolConfig};
//!
//! let pool = Arc::new(HttpPool::new(PoolConfig::new("http://localhost:8001"))?);
//! pool.set(["http://localhost:8001", "http://localhost:8002"]);
//! group.register_peers(pool.clone())?;
//! ```

mod http;
mod memory;

use std::sync::Arc;

use crate::domain::{PeerGetter, PeerPicker};

pub use http::{HttpGetter, HttpPool, PoolConfig, DEFAULT_BASE_PATH};
pub use memory::{InMemoryPeers, RegistryPeer};

/// Picker for single-node deployments: every key is owned locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_peers_never_picks() {
        assert!(NoPeers.pick_peer("Tom").is_none());
        assert!(NoPeers.pick_peer("").is_none());
    }
}
