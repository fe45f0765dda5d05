//! Domain Ports (Port/Adapter Pattern)
//!
//! The capabilities a [`Group`](crate::group::Group) depends on. Adapters
//! implement them: the HTTP transport, in-memory doubles for tests, and a
//! no-op picker for single-node setups.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Group                                 │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │       Getter   │   PeerPicker   │   PeerGetter       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Adapters (Impls)                            │
//! │   GetterFn │ HttpPool / HttpGetter │ InMemoryPeers │ NoPeers │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Data Source
// =============================================================================

/// Authoritative data source consulted on a miss not served by a peer.
///
/// This is the single source of truth. Any error it returns is handed back
/// verbatim to the caller of `Group::get`.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Look up `key`.
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts a synchronous closure into a [`Getter`].
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key)
    }
}

#[async_trait]
impl<G: Getter + ?Sized> Getter for Arc<G> {
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (**self).get(key).await
    }
}

// =============================================================================
// Peers
// =============================================================================

/// Selects the peer that owns a key.
///
/// Must be deterministic for a fixed peer set, and must return `None` when
/// the owner is the local node or no peers are configured.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches a value from one remote peer.
///
/// Any error means "fall back to the local data source"; the group never
/// treats it as fatal.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Address or name of the peer, for logs.
    fn peer(&self) -> &str;
}

// =============================================================================
// Tests
// =============================================================================
