//! HTTP Cluster Tests
//!
//! Two nodes talking over real TCP on ephemeral ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use meshcache::adapters::{HttpGetter, DEFAULT_BASE_PATH};
use meshcache::server::peer::{run_peer_server, PeerService};
use meshcache::{Error, GetterFn, Group, GroupRegistry, HttpPool, PeerGetter, PoolConfig};

struct Node {
    addr: String,
    group: Arc<Group>,
    pool: Arc<HttpPool>,
    calls: Arc<AtomicUsize>,
    server: JoinHandle<meshcache::Result<()>>,
}

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    (listener, addr)
}

fn start_node(listener: TcpListener, addr: &str, peers: &[String], shutdown: &CancellationToken) -> Node {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let db: HashMap<&str, &str> = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);

    let registry = Arc::new(GroupRegistry::new());
    let group = registry.new_group(
        "scores",
        2 << 10,
        Arc::new(GetterFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
            counter.fetch_add(1, Ordering::SeqCst);
            match db.get(key) {
                Some(v) => Ok(v.as_bytes().to_vec()),
                None => anyhow::bail!("{} not exist", key),
            }
        })),
    );

    let pool = Arc::new(HttpPool::new(PoolConfig::new(addr)).unwrap());
    pool.set(peers.iter().cloned());
    group.register_peers(pool.clone()).unwrap();

    let service = PeerService::new(Arc::clone(&pool), registry);
    let server = tokio::spawn(run_peer_server(listener, service, shutdown.clone()));

    Node {
        addr: addr.to_string(),
        group,
        pool,
        calls,
        server,
    }
}

async fn two_nodes(shutdown: &CancellationToken) -> [Node; 2] {
    let (la, a) = listener().await;
    let (lb, b) = listener().await;
    let peers = vec![a.clone(), b.clone()];
    [
        start_node(la, &a, &peers, shutdown),
        start_node(lb, &b, &peers, shutdown),
    ]
}

/// First generated key that `pool` assigns to `owner`.
fn key_owned_by(pool: &HttpPool, owner: &str) -> String {
    (0..)
        .map(|i| format!("key-{}", i))
        .find(|k| pool.owner(k).as_deref() == Some(owner))
        .unwrap()
}

#[tokio::test]
async fn test_values_served_across_nodes() {
    let shutdown = CancellationToken::new();
    let nodes = two_nodes(&shutdown).await;

    for (key, value) in [("Tom", "630"), ("Jack", "589"), ("Sam", "567")] {
        for node in &nodes {
            assert_eq!(node.group.get(key).await.unwrap().to_string(), value);
        }

        let owner = nodes[0].pool.owner(key).unwrap();
        for node in &nodes {
            assert_eq!(node.group.is_cached(key), node.addr == owner);
        }
    }

    let total: usize = nodes.iter().map(|n| n.calls.load(Ordering::SeqCst)).sum();
    assert_eq!(total, 3);
    shutdown.cancel();
}

#[tokio::test]
async fn test_peer_endpoint_statuses() {
    let shutdown = CancellationToken::new();
    let nodes = two_nodes(&shutdown).await;
    let client = reqwest::Client::new();
    let base = format!("{}{}", nodes[0].addr, DEFAULT_BASE_PATH);

    let ok = client.get(format!("{}scores/Tom", base)).send().await.unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(
        ok.headers()["content-type"],
        "application/octet-stream"
    );
    assert_eq!(ok.text().await.unwrap(), "630");

    let unknown = client.get(format!("{}nope/Tom", base)).send().await.unwrap();
    assert_eq!(unknown.status(), 404);
    assert_eq!(unknown.text().await.unwrap(), "no such group: nope");

    let malformed = client.get(format!("{}scores", base)).send().await.unwrap();
    assert_eq!(malformed.status(), 400);

    let outside = client
        .get(format!("{}/elsewhere", nodes[0].addr))
        .send()
        .await
        .unwrap();
    assert_eq!(outside.status(), 404);

    shutdown.cancel();
}

#[tokio::test]
async fn test_http_getter_maps_failures() {
    let shutdown = CancellationToken::new();
    let nodes = two_nodes(&shutdown).await;
    let getter = HttpGetter::new(nodes[1].addr.as_str(), DEFAULT_BASE_PATH, reqwest::Client::new());

    assert_eq!(getter.get("scores", "Sam").await.unwrap(), b"567");
    assert_matches!(
        getter.get("scores", "Missing").await,
        Err(Error::PeerStatus { status: 404, .. })
    );
    shutdown.cancel();
}

#[tokio::test]
async fn test_remote_fetch_fills_owner_only() {
    let shutdown = CancellationToken::new();
    let [a, b] = two_nodes(&shutdown).await;

    // owned by b, requested through a
    let key = key_owned_by(&a.pool, &b.addr);
    let err = a.group.get(&key).await.unwrap_err();

    // b's source has no such key; a falls back to its own source
    assert_matches!(err, Error::Source { .. });
    assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.group.stats().server_requests, 1);
    assert_eq!(a.group.stats().peer_errors, 1);
    shutdown.cancel();
}

#[tokio::test]
async fn test_unreachable_peer_falls_back_to_source() {
    let shutdown = CancellationToken::new();
    let (live, addr) = listener().await;

    // reserve a port, then close it so nothing answers there
    let (dead, dead_addr) = listener().await;
    drop(dead);

    let node = start_node(live, &addr, &[addr.clone(), dead_addr.clone()], &shutdown);
    let key = key_owned_by(&node.pool, &dead_addr);

    assert_matches!(node.group.get(&key).await, Err(Error::Source { .. }));
    assert_eq!(node.calls.load(Ordering::SeqCst), 1);
    assert_eq!(node.group.stats().peer_errors, 1);
    shutdown.cancel();
}

#[tokio::test]
async fn test_servers_stop_on_shutdown() {
    let shutdown = CancellationToken::new();
    let [a, b] = two_nodes(&shutdown).await;

    shutdown.cancel();
    assert!(a.server.await.unwrap().is_ok());
    assert!(b.server.await.unwrap().is_ok());
}
