//! Cache Group - the get/fill orchestrator
//!
//! A group is one named namespace of keys with its own local cache, data
//! source and (optionally) peer picker.
//!
//! # Fill Path
//!
//! ```text
//! get(key)
//!   │ empty key ───────────────────────────────▶ Error::MissingKey
//!   │ local hit ───────────────────────────────▶ value
//!   ▼
//! load(key)  (once per in-flight key)
//!   │ picker → owning peer ≠ self ─▶ remote fetch ─ ok ─▶ value (not cached)
//!   │                                     │ err: log, count, fall through
//!   ▼                                     ▼
//! data source ─ err ─▶ Error::Source
//!   │ ok
//!   ▼
//! copy → local cache → value
//! ```

mod registry;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteView, GroupStats, GroupStatsSnapshot, MainCache};
use crate::domain::{Getter, PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::singleflight::Flight;

pub use registry::{GroupBuilder, GroupRegistry};

/// A named cache namespace.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: MainCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    loader: Flight<Result<ByteView>>,
    stats: Arc<GroupStats>,
}

impl Group {
    pub(crate) fn new(name: String, cache_bytes: u64, getter: Arc<dyn Getter>) -> Self {
        let stats = Arc::new(GroupStats::new());
        Self {
            name,
            getter,
            main_cache: MainCache::new(cache_bytes, Arc::clone(&stats)),
            peers: OnceCell::new(),
            loader: Flight::new(),
            stats,
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the peer picker used to locate owning peers.
    ///
    /// Can only happen once per group; a second registration is a wiring
    /// mistake and is rejected.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::PeersAlreadyRegistered {
                group: self.name.clone(),
            })
    }

    /// Fetch `key` from the local cache, its owning peer, or the data source.
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::MissingKey);
        }

        self.stats.record_get();
        if let Some(value) = self.main_cache.get(key) {
            debug!("cache hit");
            self.stats.record_cache_hit();
            return Ok(value);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.record_load();
        self.loader
            .work(key, || async {
                self.stats.record_load_deduped();

                if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            self.stats.record_peer_error();
                            warn!(peer = %peer.peer(), error = %e, "failed to get from peer");
                        }
                    }
                }

                self.get_locally(key).await
            })
            .await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        self.stats.record_peer_load();
        let bytes = peer.get(&self.name, key).await?;
        debug!(peer = %peer.peer(), "loaded from peer");
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.getter.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_err();
                return Err(Error::data_source(key, e));
            }
        };
        self.stats.record_local_load();

        let value = ByteView::copy_from_slice(&bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }

    /// Inspect the local cache without touching recency.
    pub fn is_cached(&self, key: &str) -> bool {
        self.main_cache.contains(key)
    }

    /// Entries in the local cache
    pub fn cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Bytes held by the local cache
    pub fn cache_bytes(&self) -> u64 {
        self.main_cache.bytes()
    }

    /// Count a request that arrived from a peer.
    pub fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats
            .snapshot(&self.name, self.main_cache.len(), self.main_cache.bytes())
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache_bytes", &self.main_cache.capacity())
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
