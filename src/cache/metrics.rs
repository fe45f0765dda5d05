//! Group Statistics
//!
//! Lock-free counters describing how a group's gets were served, plus a
//! serializable snapshot for the stats endpoint and Prometheus export.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-group counters
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Any `get` request, including those served from the local cache
    gets: AtomicU64,
    /// Gets answered by the local cache
    cache_hits: AtomicU64,
    /// Remote fetch attempts (an owning peer was picked)
    peer_loads: AtomicU64,
    /// Remote fetches that failed and fell back to the data source
    peer_errors: AtomicU64,
    /// Gets that missed the local cache
    loads: AtomicU64,
    /// Loads that actually executed after deduplication
    loads_deduped: AtomicU64,
    /// Successful data source lookups
    local_loads: AtomicU64,
    /// Failed data source lookups
    local_load_errs: AtomicU64,
    /// Requests that arrived from peers over the transport
    server_requests: AtomicU64,
    /// Entries evicted from the local cache
    evictions: AtomicU64,
}

impl GroupStats {
    /// Create a zeroed stats block
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn peer_errors(&self) -> u64 {
        self.peer_errors.load(Ordering::Relaxed)
    }

    pub fn loads_deduped(&self) -> u64 {
        self.loads_deduped.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Capture all counters together with the cache's current occupancy.
    pub fn snapshot(&self, group: &str, cache_entries: usize, cache_bytes: u64) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            group: group.to_string(),
            gets: self.gets(),
            cache_hits: self.cache_hits(),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors(),
            loads: self.loads.load(Ordering::Relaxed),
            loads_deduped: self.loads_deduped(),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
            evictions: self.evictions(),
            cache_entries: cache_entries as u64,
            cache_bytes,
            taken_at: Utc::now(),
        }
    }
}

/// Point-in-time copy of a group's counters
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatsSnapshot {
    pub group: String,
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
    pub evictions: u64,
    pub cache_entries: u64,
    pub cache_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

impl GroupStatsSnapshot {
    /// Fraction of gets served from the local cache
    pub fn hit_ratio(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.gets as f64
        }
    }

    /// Counter values by metric name, used by the Prometheus exporter.
    pub fn counters(&self) -> [(&'static str, u64); 12] {
        [
            ("gets", self.gets),
            ("cache_hits", self.cache_hits),
            ("peer_loads", self.peer_loads),
            ("peer_errors", self.peer_errors),
            ("loads", self.loads),
            ("loads_deduped", self.loads_deduped),
            ("local_loads", self.local_loads),
            ("local_load_errs", self.local_load_errs),
            ("server_requests", self.server_requests),
            ("evictions", self.evictions),
            ("cache_entries", self.cache_entries),
            ("cache_bytes", self.cache_bytes),
        ]
    }
}
