//! Observability infrastructure for the usage monitor
//!
//! Prometheus metrics covering both sides of the sample feed: collection
//! latency and per-source failures on the agent, ingested samples on the
//! aggregator.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Histogram buckets for collection latency (seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    collection_latency_seconds: Histogram,
    source_errors_total: IntCounterVec,
    samples_delivered_total: IntCounter,
    delivery_failures_total: IntCounter,
    samples_ingested_total: IntCounterVec,
    ingest_rejections_total: IntCounter,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "usage_monitor_collection_latency_seconds",
                "Time spent reading kernel counter sources per tick",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            source_errors_total: register_int_counter_vec!(
                "usage_monitor_source_errors_total",
                "Counter source read failures by source",
                &["source"]
            )
            .expect("Failed to register source_errors_total"),

            samples_delivered_total: register_int_counter!(
                "usage_monitor_samples_delivered_total",
                "Samples successfully delivered to the aggregator"
            )
            .expect("Failed to register samples_delivered_total"),

            delivery_failures_total: register_int_counter!(
                "usage_monitor_delivery_failures_total",
                "Sample delivery attempts that failed"
            )
            .expect("Failed to register delivery_failures_total"),

            samples_ingested_total: register_int_counter_vec!(
                "usage_monitor_samples_ingested_total",
                "Samples accepted by the store, by entity kind",
                &["kind"]
            )
            .expect("Failed to register samples_ingested_total"),

            ingest_rejections_total: register_int_counter!(
                "usage_monitor_ingest_rejections_total",
                "Samples rejected at ingestion for invalid identity"
            )
            .expect("Failed to register ingest_rejections_total"),
        }
    }
}

/// Lightweight handle to the global metrics instance
///
/// Multiple clones share the same underlying Prometheus metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long one collection tick took
    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner()
            .collection_latency_seconds
            .observe(duration_secs);
    }

    /// Record a failed read of one counter source
    pub fn inc_source_error(&self, source: &str) {
        self.inner()
            .source_errors_total
            .with_label_values(&[source])
            .inc();
    }

    /// Record a successfully delivered sample
    pub fn inc_samples_delivered(&self) {
        self.inner().samples_delivered_total.inc();
    }

    /// Record a failed delivery attempt
    pub fn inc_delivery_failure(&self) {
        self.inner().delivery_failures_total.inc();
    }

    /// Record a sample accepted into the store
    pub fn inc_samples_ingested(&self, kind: &str) {
        self.inner()
            .samples_ingested_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a sample rejected at ingestion
    pub fn inc_ingest_rejection(&self) {
        self.inner().ingest_rejections_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_is_cloneable() {
        let metrics = MonitorMetrics::new();
        let clone = metrics.clone();

        metrics.observe_collection_latency(0.005);
        clone.inc_source_error("memory");
        clone.inc_samples_ingested("node");
    }
}
