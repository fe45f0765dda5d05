//! Prometheus Exporter
//!
//! Group counters already live in [`GroupStats`](crate::cache::GroupStats),
//! so each scrape builds a fresh registry from the current snapshots
//! instead of mirroring every increment into global collectors.

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::cache::GroupStatsSnapshot;
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::server::{respond, serve, text, Body};

/// Prefix of every exported metric name
pub const METRIC_PREFIX: &str = "meshcache";

/// Occupancy values, exported as gauges; everything else is a counter.
const GAUGES: [&str; 2] = ["cache_entries", "cache_bytes"];

/// Renders group statistics for Prometheus.
#[derive(Debug, Clone)]
pub struct MetricsExporter {
    registry: Arc<GroupRegistry>,
}

impl MetricsExporter {
    pub fn new(registry: Arc<GroupRegistry>) -> Self {
        Self { registry }
    }

    /// Encode the current statistics of all groups.
    pub fn render(&self) -> Result<String> {
        let registry = Registry::new();
        collect(&registry, &self.registry.snapshots()).map_err(prom_error)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(prom_error)?;

        String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("Metrics output is not UTF-8: {}", e)))
    }

    pub fn handle(&self, path: &str) -> Response<Body> {
        if path != "/metrics" {
            return text(StatusCode::NOT_FOUND, "not found");
        }

        match self.render() {
            Ok(body) => respond(StatusCode::OK, prometheus::TEXT_FORMAT, body),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

fn collect(registry: &Registry, snapshots: &[GroupStatsSnapshot]) -> prometheus::Result<()> {
    let Some(first) = snapshots.first() else {
        return Ok(());
    };

    // Metric names are the same for every snapshot; register them once.
    for (name, _) in first.counters() {
        if GAUGES.contains(&name) {
            let gauge = IntGaugeVec::new(
                Opts::new(format!("{}_{}", METRIC_PREFIX, name), format!("Group {}", name)),
                &["group"],
            )?;
            registry.register(Box::new(gauge.clone()))?;
            for snapshot in snapshots {
                let value = lookup(snapshot, name);
                gauge
                    .with_label_values(&[snapshot.group.as_str()])
                    .set(i64::try_from(value).unwrap_or(i64::MAX));
            }
        } else {
            let counter = IntCounterVec::new(
                Opts::new(
                    format!("{}_{}_total", METRIC_PREFIX, name),
                    format!("Group {} since start", name),
                ),
                &["group"],
            )?;
            registry.register(Box::new(counter.clone()))?;
            for snapshot in snapshots {
                counter
                    .with_label_values(&[snapshot.group.as_str()])
                    .inc_by(lookup(snapshot, name));
            }
        }
    }
    Ok(())
}

fn lookup(snapshot: &GroupStatsSnapshot, name: &str) -> u64 {
    snapshot
        .counters()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

fn prom_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("Prometheus error: {}", e))
}

/// Serve `/metrics` on `listener` until `shutdown` fires.
pub async fn run_metrics_server(
    listener: TcpListener,
    exporter: MetricsExporter,
    shutdown: CancellationToken,
) -> Result<()> {
    serve(
        listener,
        "metrics",
        move |req: Request<Incoming>| {
            let response = exporter.handle(req.uri().path());
            async move { response }
        },
        shutdown,
    )
    .await
}
