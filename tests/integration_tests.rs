//! meshcache Integration Tests
//!
//! Multi-node behaviour exercised in one process through the in-memory
//! peer adapters:
//! - Cluster fills: owner-only loading, remote values not cached
//! - Peer failure fallback
//! - Load deduplication under concurrency
//! - Single-node lookups

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;

use meshcache::adapters::RegistryPeer;
use meshcache::{
    Error, Getter, GetterFn, Group, GroupRegistry, InMemoryPeers, NoPeers, PeerGetter, PeerPicker,
};

const NODES: [&str; 3] = ["node-a", "node-b", "node-c"];

fn db() -> HashMap<&'static str, &'static str> {
    HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
}

/// Data source over the demo scores that counts its lookups.
fn counting_getter(calls: Arc<AtomicUsize>) -> Arc<dyn Getter> {
    let db = db();
    Arc::new(GetterFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
        calls.fetch_add(1, Ordering::SeqCst);
        match db.get(key) {
            Some(v) => Ok(v.as_bytes().to_vec()),
            None => anyhow::bail!("{} not exist", key),
        }
    }))
}

// =============================================================================
// In-memory cluster
// =============================================================================

struct Node {
    registry: Arc<GroupRegistry>,
    group: Arc<Group>,
    picker: Arc<InMemoryPeers>,
    calls: Arc<AtomicUsize>,
}

fn cluster() -> Vec<Node> {
    let nodes: Vec<Node> = NODES
        .iter()
        .map(|name| {
            let registry = Arc::new(GroupRegistry::new());
            let calls = Arc::new(AtomicUsize::new(0));
            let group = registry.new_group("scores", 2 << 10, counting_getter(Arc::clone(&calls)));
            Node {
                registry,
                group,
                picker: Arc::new(InMemoryPeers::new(*name, 50)),
                calls,
            }
        })
        .collect();

    for (i, node) in nodes.iter().enumerate() {
        let peers: Vec<Arc<dyn PeerGetter>> = nodes
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| {
                Arc::new(RegistryPeer::new(NODES[j], Arc::clone(&other.registry)))
                    as Arc<dyn PeerGetter>
            })
            .collect();
        node.picker.set(peers);
        node.group.register_peers(node.picker.clone()).unwrap();
    }
    nodes
}

fn index_of(owner: &str) -> usize {
    NODES.iter().position(|n| *n == owner).unwrap()
}

mod cluster_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_node_returns_same_value() {
        let nodes = cluster();

        for (key, value) in db() {
            for node in &nodes {
                assert_eq!(node.group.get(key).await.unwrap().to_string(), value);
            }
        }
    }

    #[tokio::test]
    async fn test_only_owner_loads_from_source() {
        let nodes = cluster();
        let mut expected = [0usize; 3];

        for key in db().keys() {
            let owner = index_of(&nodes[0].picker.owner(key).unwrap());
            expected[owner] += 1;
            for node in &nodes {
                node.group.get(key).await.unwrap();
            }
        }

        let calls: Vec<usize> = nodes.iter().map(|n| n.calls.load(Ordering::SeqCst)).collect();
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn test_remote_values_not_cached() {
        let nodes = cluster();

        for key in db().keys() {
            let owner = index_of(&nodes[0].picker.owner(key).unwrap());
            for node in &nodes {
                node.group.get(key).await.unwrap();
            }

            for (i, node) in nodes.iter().enumerate() {
                assert_eq!(node.group.is_cached(key), i == owner, "key {} on {}", key, NODES[i]);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_key_errors_everywhere() {
        let nodes = cluster();

        for node in &nodes {
            let err = node.group.get("Missing").await.unwrap_err();
            assert!(!node.group.is_cached("Missing"));
            // non-owners fall back to their own source after the peer's 404
            assert_matches!(err, Error::Source { .. });
        }
    }

    #[tokio::test]
    async fn test_peer_requests_are_counted() {
        let nodes = cluster();
        let key = "Tom";
        let owner = index_of(&nodes[0].picker.owner(key).unwrap());

        for node in &nodes {
            node.group.get(key).await.unwrap();
        }

        let served = nodes[owner].group.stats().server_requests;
        assert_eq!(served, 2);
    }
}

// =============================================================================
// Fallback
// =============================================================================

mod fallback_tests {
    use super::*;

    struct DownPeer;

    #[async_trait]
    impl PeerGetter for DownPeer {
        async fn get(&self, _group: &str, _key: &str) -> meshcache::Result<Vec<u8>> {
            Err(Error::PeerRequest {
                peer: "down".into(),
                reason: "connection refused".into(),
            })
        }

        fn peer(&self) -> &str {
            "down"
        }
    }

    struct AlwaysDown;

    impl PeerPicker for AlwaysDown {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(Arc::new(DownPeer))
        }
    }

    #[tokio::test]
    async fn test_failing_peer_falls_back_to_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 2 << 10, counting_getter(Arc::clone(&calls)));
        group.register_peers(Arc::new(AlwaysDown)).unwrap();

        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        assert!(group.is_cached("Tom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // served from the local cache now, the peer is not asked again
        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        let stats = group.stats();
        assert_eq!(stats.peer_loads, 1);
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_peer_without_group_falls_back() {
        let calls = Arc::new(AtomicUsize::new(0));
        let local = GroupRegistry::new();
        let group = local.new_group("scores", 2 << 10, counting_getter(Arc::clone(&calls)));

        // the only other node has no "scores" group
        let picker = Arc::new(InMemoryPeers::new("self", 50));
        picker.set(vec![
            Arc::new(RegistryPeer::new("empty", Arc::new(GroupRegistry::new())))
                as Arc<dyn PeerGetter>,
        ]);
        group.register_peers(picker).unwrap();

        for (key, value) in db() {
            assert_eq!(group.get(key).await.unwrap().to_string(), value);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

// =============================================================================
// Deduplication
// =============================================================================

mod dedup_tests {
    use super::*;

    struct SlowSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SlowSource {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Getter for SlowSource {
        async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                anyhow::bail!("{} not exist", key);
            }
            Ok(format!("value-of-{}", key).into_bytes())
        }
    }

    #[tokio::test]
    async fn test_concurrent_gets_load_once() {
        let source = SlowSource::new(false);
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 2 << 10, source.clone());

        let gets = (0..16).map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("Tom").await })
        });
        let results = futures::future::join_all(gets).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap().to_string(), "value-of-Tom");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().loads_deduped, 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_shared_then_retried() {
        let source = SlowSource::new(true);
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 0, source.clone());

        let (a, b) = tokio::join!(group.get("Missing"), group.get("Missing"));
        assert_eq!(a.unwrap_err().to_string(), "Missing not exist");
        assert_eq!(b.unwrap_err().to_string(), "Missing not exist");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // failures are not remembered once the call completes
        assert!(group.get("Missing").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}

// =============================================================================
// Single node
// =============================================================================

mod single_node_tests {
    use super::*;

    #[tokio::test]
    async fn test_scores_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = GroupRegistry::new();
        let group = registry
            .builder("scores")
            .cache_bytes(2 << 10)
            .getter(counting_getter(Arc::clone(&calls)))
            .build()
            .unwrap();
        group.register_peers(Arc::new(NoPeers)).unwrap();

        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        assert!(group.is_cached("Tom"));

        let err = group.get("Missing").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing not exist");
        assert!(!group.is_cached("Missing"));
        assert_eq!(group.cache_len(), 1);

        assert_matches!(group.get("").await, Err(Error::MissingKey));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 0, counting_getter(Arc::default()));

        let found = registry.get_group("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert!(registry.get_group("nope").is_none());
    }

    #[tokio::test]
    async fn test_builder_requires_getter() {
        let registry = GroupRegistry::new();
        assert_matches!(
            registry.builder("scores").build(),
            Err(Error::MissingGetter { group }) if group == "scores"
        );
        assert!(registry.is_empty());
    }
}
