//! Node agent - per-node usage sample collector
//!
//! Runs on every node, reading kernel-exposed counters each tick and
//! delivering one sample per tracked entity to the central aggregator.

use anyhow::Result;
use monitor_lib::collector::{
    HostSampler, PodSampler, SamplerConfig, SamplerLoop, ScopeRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod delivery;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting node-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        aggregator = %config.aggregator_url,
        interval_secs = config.collect_interval_secs,
        "Agent configured"
    );

    let sink = Arc::new(delivery::HttpSink::new(&config.aggregator_url)?);
    let host = HostSampler::with_roots(
        config.node_name.clone(),
        config.cgroup_root.clone(),
        config.proc_root.clone(),
    );
    let pods = PodSampler::new(config.node_name.clone(), config.cgroup_root.clone());
    let registry = Arc::new(ScopeRegistry::new(config.default_namespace.clone()));
    if let Some(path) = &config.scope_assignments_path {
        registry.load_assignments(path).await?;
    }

    let sampler_config = SamplerConfig {
        interval: Duration::from_secs(config.collect_interval_secs),
        collect_pods: config.collect_pods,
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let sampler = SamplerLoop::new(host, pods, registry, sink, sampler_config);
    let loop_handle = tokio::spawn(sampler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());
    loop_handle.await?;

    Ok(())
}
