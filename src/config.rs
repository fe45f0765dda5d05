//! Node Configuration
//!
//! Settings for one cache node, read from an optional YAML file and then
//! overridden by command-line flags. Validated once at startup; there is no
//! runtime reconfiguration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{PoolConfig, DEFAULT_BASE_PATH};
use crate::cache::DEFAULT_CACHE_BYTES;
use crate::error::{Error, Result};
use crate::hashring::DEFAULT_REPLICAS;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a cache node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    /// This node's base URL, as listed in `peers`
    pub self_addr: String,

    /// Base URLs of every node in the cluster, this one included
    pub peers: Vec<String>,

    /// Name of the served group
    pub group: String,

    /// Local cache capacity in bytes (0 = unbounded)
    pub cache_bytes: u64,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Path prefix of the peer endpoint
    pub base_path: String,

    /// Start the front-end API server
    pub api: bool,

    /// Front-end API listen address
    pub api_addr: String,

    /// Health server listen address
    pub health_addr: Option<String>,

    /// Metrics server listen address
    pub metrics_addr: Option<String>,

    /// Peer fetch timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            self_addr: "http://localhost:8001".to_string(),
            peers: vec![
                "http://localhost:8001".to_string(),
                "http://localhost:8002".to_string(),
                "http://localhost:8003".to_string(),
            ],
            group: "scores".to_string(),
            cache_bytes: DEFAULT_CACHE_BYTES,
            replicas: DEFAULT_REPLICAS,
            base_path: DEFAULT_BASE_PATH.to_string(),
            api: false,
            api_addr: "127.0.0.1:9999".to_string(),
            health_addr: None,
            metrics_addr: None,
            request_timeout_secs: 5,
        }
    }
}

impl NodeConfig {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the settings are usable before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.group.is_empty() {
            return Err(Error::Config("group name must not be empty".into()));
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".into()));
        }
        if self.peers.is_empty() {
            return Err(Error::Config("peer list must not be empty".into()));
        }
        if !self.peers.contains(&self.self_addr) {
            return Err(Error::Config(format!(
                "self address {} is not in the peer list",
                self.self_addr
            )));
        }
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }
        Ok(())
    }

    /// Socket address the peer server binds: the self URL without scheme.
    pub fn bind_addr(&self) -> String {
        let addr = self
            .self_addr
            .split_once("://")
            .map_or(self.self_addr.as_str(), |(_, rest)| rest);
        addr.trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            self_addr: self.self_addr.clone(),
            base_path: self.base_path.clone(),
            replicas: self.replicas,
            request_timeout: self.request_timeout(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
