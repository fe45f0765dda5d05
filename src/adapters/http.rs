//! HTTP Peer Pool
//!
//! Client side of the default transport: picks the owning peer from a
//! consistent hash ring of peer base URLs and fetches values from it with
//! `reqwest`. The serving side lives in [`crate::server::peer`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::domain::{PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::hashring::{HashRing, DEFAULT_REPLICAS};

/// Path prefix under which peers serve `/{group}/{key}`
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an HTTP peer pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// This node's base URL, e.g. `http://localhost:8001`
    pub self_addr: String,

    /// Path prefix for peer requests
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Timeout for a single peer fetch
    pub request_timeout: Duration,
}

impl PoolConfig {
    pub fn new(self_addr: impl Into<String>) -> Self {
        Self {
            self_addr: self_addr.into(),
            ..Default::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            self_addr: "http://localhost:8001".to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Peer Getter
// =============================================================================

/// Fetches values from one remote peer over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    peer: String,
    base_url: String,
    client: Client,
}

impl HttpGetter {
    pub fn new(peer: impl Into<String>, base_path: &str, client: Client) -> Self {
        let peer = peer.into();
        Self {
            base_url: format!("{}{}", peer, base_path),
            peer,
            client,
        }
    }

    /// URL of `key` in `group` on this peer, both percent-encoded.
    pub fn url(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    #[instrument(skip(self), fields(peer = %self.peer))]
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url(group, key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::PeerRequest {
                peer: self.peer.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PeerStatus {
                peer: self.peer.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::PeerBody {
            peer: self.peer.clone(),
            reason: e.to_string(),
        })?;

        debug!(bytes = body.len(), "peer fetch complete");
        Ok(body.to_vec())
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

// =============================================================================
// Peer Pool
// =============================================================================

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Hash-ring peer picker over HTTP peers.
pub struct HttpPool {
    config: PoolConfig,
    client: Client,
    state: RwLock<PoolState>,
}

impl HttpPool {
    /// Create a pool with an empty peer set.
    pub fn new(config: PoolConfig) -> Result<Self> {
        if !config.base_path.starts_with('/') || !config.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                config.base_path
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let state = PoolState {
            ring: HashRing::new(config.replicas, None),
            getters: HashMap::new(),
        };

        Ok(Self {
            config,
            client,
            state: RwLock::new(state),
        })
    }

    /// Replace the peer set. The ring and per-peer getters are rebuilt
    /// from scratch.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let ring = HashRing::with_peers(self.config.replicas, None, &peers);
        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(peer.as_str(), &self.config.base_path, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.state.write() = PoolState { ring, getters };
        info!(self_addr = %self.config.self_addr, peers = ?peers, "peer set updated");
    }

    /// Current peers, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.state.read().getters.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn self_addr(&self) -> &str {
        &self.config.self_addr
    }

    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    /// Owning peer address for `key`, including this node.
    pub fn owner(&self, key: &str) -> Option<String> {
        self.state.read().ring.get(key).map(str::to_string)
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let peer = state.ring.get(key)?;
        if peer == self.config.self_addr {
            return None;
        }

        debug!(self_addr = %self.config.self_addr, peer = %peer, key = %key, "pick peer");
        state
            .getters
            .get(peer)
            .map(|getter| Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const NODES: [&str; 3] = [
        "http://localhost:8001",
        "http://localhost:8002",
        "http://localhost:8003",
    ];

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.base_path, "/_geecache/");
        assert_eq!(config.replicas, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_getter_url_is_percent_encoded() {
        let getter = HttpGetter::new("http://localhost:8002", DEFAULT_BASE_PATH, Client::new());
        assert_eq!(
            getter.url("scores", "a b/c"),
            "http://localhost:8002/_geecache/scores/a%20b%2Fc"
        );
        assert_eq!(getter.peer(), "http://localhost:8002");
    }

    #[test]
    fn test_invalid_base_path_rejected() {
        let config = PoolConfig {
            base_path: "_geecache".into(),
            ..PoolConfig::new(NODES[0])
        };
        assert_matches!(HttpPool::new(config), Err(Error::Config(_)));
    }

    #[test]
    fn test_empty_pool_picks_nothing() {
        let pool = HttpPool::new(PoolConfig::new(NODES[0])).unwrap();
        assert!(pool.pick_peer("Tom").is_none());
        assert!(pool.peers().is_empty());
    }

    #[test]
    fn test_pick_peer_skips_self() {
        let pool = HttpPool::new(PoolConfig::new(NODES[0])).unwrap();
        pool.set(NODES);

        for i in 0..200 {
            let key = format!("key-{}", i);
            let owner = pool.owner(&key).unwrap();
            match pool.pick_peer(&key) {
                Some(peer) => {
                    assert_ne!(owner, NODES[0]);
                    assert_eq!(peer.peer(), owner);
                }
                None => assert_eq!(owner, NODES[0]),
            }
        }
    }

    #[test]
    fn test_all_nodes_agree_on_owner() {
        let pools: Vec<HttpPool> = NODES
            .iter()
            .map(|addr| {
                let pool = HttpPool::new(PoolConfig::new(*addr)).unwrap();
                pool.set(NODES);
                pool
            })
            .collect();

        for key in ["Tom", "Jack", "Sam", "Missing"] {
            let owner = pools[0].owner(key);
            assert!(pools.iter().all(|p| p.owner(key) == owner));
        }
    }

    #[test]
    fn test_set_replaces_peer_set() {
        let pool = HttpPool::new(PoolConfig::new(NODES[0])).unwrap();
        pool.set(NODES);
        pool.set([NODES[0]]);

        assert_eq!(pool.peers(), vec![NODES[0].to_string()]);
        assert!(pool.pick_peer("Tom").is_none());
    }
}
