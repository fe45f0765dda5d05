//! In-Memory Peers
//!
//! Transport-free peer adapters: a ring-backed picker over in-process
//! getters, and a getter that reads straight out of another node's
//! [`GroupRegistry`]. Used to simulate multi-node clusters in one process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::hashring::{HashFn, HashRing};

struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<dyn PeerGetter>>,
}

/// Hash-ring picker over in-process peers.
pub struct InMemoryPeers {
    self_name: String,
    replicas: usize,
    hash: Option<HashFn>,
    state: RwLock<PeerSet>,
}

impl InMemoryPeers {
    pub fn new(self_name: impl Into<String>, replicas: usize) -> Self {
        Self::with_hash(self_name, replicas, None)
    }

    /// Picker with a custom ring hash, for predictable placement in tests.
    pub fn with_hash(self_name: impl Into<String>, replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            self_name: self_name.into(),
            replicas,
            hash,
            state: RwLock::new(PeerSet {
                ring: HashRing::new(replicas, hash),
                getters: HashMap::new(),
            }),
        }
    }

    /// Replace the peer set. The local node takes part in the ring under
    /// `self_name` and needs no getter.
    pub fn set(&self, peers: Vec<Arc<dyn PeerGetter>>) {
        let mut names: Vec<String> = peers.iter().map(|p| p.peer().to_string()).collect();
        if !names.contains(&self.self_name) {
            names.push(self.self_name.clone());
        }

        let ring = HashRing::with_peers(self.replicas, self.hash, &names);
        let getters = peers
            .into_iter()
            .map(|p| (p.peer().to_string(), p))
            .collect();

        *self.state.write() = PeerSet { ring, getters };
    }

    /// Owning node name for `key`, including this node.
    pub fn owner(&self, key: &str) -> Option<String> {
        self.state.read().ring.get(key).map(str::to_string)
    }
}

impl PeerPicker for InMemoryPeers {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.get(key)?;
        if owner == self.self_name {
            return None;
        }
        state.getters.get(owner).cloned()
    }
}

/// Peer getter backed by another node's registry.
///
/// Failures are reported the way the HTTP transport would report them:
/// as a status from the peer.
pub struct RegistryPeer {
    name: String,
    registry: Arc<GroupRegistry>,
}

impl RegistryPeer {
    pub fn new(name: impl Into<String>, registry: Arc<GroupRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }
}

#[async_trait]
impl PeerGetter for RegistryPeer {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let group = self.registry.get_group(group).ok_or_else(|| Error::PeerStatus {
            peer: self.name.clone(),
            status: 404,
        })?;
        group.record_server_request();

        match group.get(key).await {
            Ok(value) => Ok(value.byte_slice()),
            Err(e) => Err(Error::PeerStatus {
                peer: self.name.clone(),
                status: e.status_code(),
            }),
        }
    }

    fn peer(&self) -> &str {
        &self.name
    }
}
