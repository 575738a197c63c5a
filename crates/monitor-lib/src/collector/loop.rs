//! Periodic sampling loop
//!
//! Runs one tick per interval: assemble the node sample, enumerate workload
//! scopes, and hand every sample to the delivery sink exactly once. A failed
//! delivery is logged and dropped; the next tick re-samples and re-attempts.
//! The loop terminates only on an external shutdown signal, never on a
//! data-source or delivery error.

use super::host::HostSampler;
use super::pods::{PodSampler, ScopeRegistry};
use super::SourceReport;
use crate::models::{NodeSample, PodSample};
use crate::observability::MonitorMetrics;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

/// Delivery seam between the sampler and the aggregator.
///
/// Implementations must bound each attempt with a short timeout so a slow
/// transport cannot block the next tick; the loop never retries within a
/// tick.
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn deliver_node(&self, sample: &NodeSample) -> Result<()>;
    async fn deliver_pod(&self, sample: &PodSample) -> Result<()>;
}

/// Configuration for the sampling loop
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Tick interval
    pub interval: Duration,
    /// Whether to enumerate and sample workload scopes each tick
    pub collect_pods: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            collect_pods: true,
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// Per-source outcomes for the node sample
    pub sources: SourceReport,
    /// Workload scopes sampled this tick
    pub pods_sampled: usize,
    /// Samples handed to the sink that were accepted
    pub delivered: usize,
    /// Samples the sink failed to deliver
    pub delivery_failures: usize,
}

/// Drives periodic collection and delivery for one node
pub struct SamplerLoop {
    host: HostSampler,
    pods: PodSampler,
    registry: Arc<ScopeRegistry>,
    sink: Arc<dyn SampleSink>,
    config: SamplerConfig,
    metrics: MonitorMetrics,
}

impl SamplerLoop {
    pub fn new(
        host: HostSampler,
        pods: PodSampler,
        registry: Arc<ScopeRegistry>,
        sink: Arc<dyn SampleSink>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            host,
            pods,
            registry,
            sink,
            config,
            metrics: MonitorMetrics::new(),
        }
    }

    /// Run ticks until the shutdown signal fires
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            node = %self.host.node_name(),
            "Starting sampling loop"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.sources.degraded() || report.delivery_failures > 0 {
                        debug!(?report, "Tick completed with failures");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sampling loop");
                    break;
                }
            }
        }
    }

    /// Execute one collection tick
    pub async fn tick(&self) -> TickReport {
        let start = Instant::now();
        let mut report = TickReport::default();

        let (sample, sources) = self.host.sample_node().await;
        report.sources = sources;
        self.record_source_errors(&sources);

        match self.sink.deliver_node(&sample).await {
            Ok(()) => {
                report.delivered += 1;
                self.metrics.inc_samples_delivered();
            }
            Err(e) => {
                report.delivery_failures += 1;
                self.metrics.inc_delivery_failure();
                warn!(node = %sample.node, error = %e, "Node sample delivery failed");
            }
        }

        if self.config.collect_pods {
            match self.pods.discover_scopes().await {
                Ok(scopes) => {
                    for scope in scopes {
                        let sample = self.pods.sample_scope(&scope, &self.registry).await;
                        report.pods_sampled += 1;

                        match self.sink.deliver_pod(&sample).await {
                            Ok(()) => {
                                report.delivered += 1;
                                self.metrics.inc_samples_delivered();
                            }
                            Err(e) => {
                                report.delivery_failures += 1;
                                self.metrics.inc_delivery_failure();
                                warn!(pod = %sample.pod, error = %e, "Pod sample delivery failed");
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Workload scope enumeration unavailable");
                }
            }
        }

        self.metrics
            .observe_collection_latency(start.elapsed().as_secs_f64());
        report
    }

    fn record_source_errors(&self, sources: &SourceReport) {
        use super::SourceStatus::Unavailable;

        for (name, status) in [
            ("cpu", sources.cpu),
            ("memory", sources.memory),
            ("network", sources.network),
            ("disk", sources.disk),
        ] {
            if status == Unavailable {
                self.metrics.inc_source_error(name);
            }
        }
    }
}
