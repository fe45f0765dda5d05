//! meshcache node
//!
//! Runs one node of a peer-distributed cache serving a demo "scores" group.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         meshcache node                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  API server  │───▶│    Group     │───▶│   HttpPool   │──▶ peers
//! │  │ (/api?key=)  │    │ cache+flight │    │ (hash ring)  │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │  ┌──────────────┐           │                                    │
//! │  │ Peer server  │───────────┘ ──▶ SlowDB (data source)           │
//! │  └──────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Three local nodes, one of them with the API front-end:
//!
//! ```text
//! meshcache --port 8001 &
//! meshcache --port 8002 &
//! meshcache --port 8003 --api &
//! curl "http://localhost:9999/api?key=Tom"
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meshcache::adapters::HttpPool;
use meshcache::config::NodeConfig;
use meshcache::domain::GetterFn;
use meshcache::metrics::{run_metrics_server, MetricsExporter};
use meshcache::server::api::{run_api_server, ApiService};
use meshcache::server::health::{run_health_server, Readiness};
use meshcache::server::peer::{run_peer_server, PeerService};
use meshcache::server::bind;
use meshcache::{Error, GroupRegistry, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// meshcache - peer-distributed read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; flags override its values
    #[arg(long, env = "MESHCACHE_CONFIG")]
    config: Option<String>,

    /// Peer server port
    #[arg(long, env = "MESHCACHE_PORT")]
    port: Option<u16>,

    /// Host name used in this node's peer URL
    #[arg(long, env = "MESHCACHE_HOST", default_value = "localhost")]
    host: String,

    /// Start the front-end API server
    #[arg(long, env = "MESHCACHE_API")]
    api: bool,

    /// Front-end API bind address
    #[arg(long, env = "MESHCACHE_API_ADDR")]
    api_addr: Option<String>,

    /// Base URLs of all nodes, this one included (comma separated)
    #[arg(long, env = "MESHCACHE_PEERS", value_delimiter = ',')]
    peers: Option<Vec<String>>,

    /// Group name
    #[arg(long, env = "MESHCACHE_GROUP")]
    group: Option<String>,

    /// Local cache capacity in bytes (0 = unbounded)
    #[arg(long, env = "MESHCACHE_CACHE_BYTES")]
    cache_bytes: Option<u64>,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "MESHCACHE_REPLICAS")]
    replicas: Option<usize>,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR")]
    health_addr: Option<String>,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Layer the flags over the file (or default) configuration.
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_yaml_file(path)?,
            None => NodeConfig::default(),
        };

        if let Some(port) = self.port {
            config.self_addr = format!("http://{}:{}", self.host, port);
        }
        if self.api {
            config.api = true;
        }
        if let Some(addr) = &self.api_addr {
            config.api_addr = addr.clone();
        }
        if let Some(peers) = &self.peers {
            config.peers = peers.iter().map(|p| p.trim().to_string()).collect();
        }
        if let Some(group) = &self.group {
            config.group = group.clone();
        }
        if let Some(cache_bytes) = self.cache_bytes {
            config.cache_bytes = cache_bytes;
        }
        if let Some(replicas) = self.replicas {
            config.replicas = replicas;
        }
        if self.health_addr.is_some() {
            config.health_addr = self.health_addr.clone();
        }
        if self.metrics_addr.is_some() {
            config.metrics_addr = self.metrics_addr.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.node_config()?;

    info!("Starting meshcache node");
    info!("  Self: {}", config.self_addr);
    info!("  Peers: {:?}", config.peers);
    info!("  Group: {} ({} bytes)", config.group, config.cache_bytes);
    info!("  Replicas: {}", config.replicas);

    let registry = Arc::new(GroupRegistry::new());
    let group = registry
        .builder(config.group.clone())
        .cache_bytes(config.cache_bytes)
        .getter(Arc::new(slow_db()))
        .build()?;

    let pool = Arc::new(HttpPool::new(config.pool_config())?);
    pool.set(config.peers.clone());
    group.register_peers(pool.clone())?;

    let shutdown = CancellationToken::new();
    let readiness = Readiness::new();
    let mut servers: Vec<JoinHandle<()>> = Vec::new();

    // Peer server
    let listener = bind(&config.bind_addr(), "peer").await?;
    let service = PeerService::new(Arc::clone(&pool), Arc::clone(&registry));
    servers.push(spawn_server(
        "Peer",
        run_peer_server(listener, service, shutdown.clone()),
    ));

    // Front-end API
    if config.api {
        let listener = bind(&config.api_addr, "api").await?;
        let service = ApiService::new(Arc::clone(&group), Arc::clone(&registry));
        servers.push(spawn_server(
            "API",
            run_api_server(listener, service, shutdown.clone()),
        ));
    }

    if let Some(addr) = &config.health_addr {
        let listener = bind(addr, "health").await?;
        servers.push(spawn_server(
            "Health",
            run_health_server(listener, readiness.clone(), shutdown.clone()),
        ));
    }

    if let Some(addr) = &config.metrics_addr {
        let listener = bind(addr, "metrics").await?;
        let exporter = MetricsExporter::new(Arc::clone(&registry));
        servers.push(spawn_server(
            "Metrics",
            run_metrics_server(listener, exporter, shutdown.clone()),
        ));
    }

    readiness.set_ready();
    info!("meshcache node ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Internal(format!("Failed to listen for shutdown signal: {}", e)))?;

    info!("Shutdown signal received");
    shutdown.cancel();
    futures::future::join_all(servers).await;

    info!("meshcache shutdown complete");
    Ok(())
}

fn spawn_server<F>(name: &'static str, server: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("{} server error: {}", name, e);
        }
    })
}

// =============================================================================
// Demo Data Source
// =============================================================================

/// Stand-in for a slow backing database.
fn slow_db() -> GetterFn<impl Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync> {
    let db: HashMap<&'static str, &'static str> =
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);

    GetterFn(move |key: &str| -> anyhow::Result<Vec<u8>> {
        info!("[SlowDB] search key {}", key);
        match db.get(key) {
            Some(value) => Ok(value.as_bytes().to_vec()),
            None => anyhow::bail!("{} not exist", key),
        }
    })
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
