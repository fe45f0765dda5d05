//! Metrics module
//!
//! Exposes every group's counters in the Prometheus text format on
//! `/metrics`.

mod exporter;

pub use exporter::{run_metrics_server, MetricsExporter, METRIC_PREFIX};
