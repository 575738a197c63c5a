//! Aggregator - central usage-sample store and query API
//!
//! Receives samples posted by per-node agents (and external namespace and
//! deployment producers) and serves latest-value and windowed queries over
//! them at four entity granularities.

use aggregator::{api, config};
use anyhow::Result;
use monitor_lib::{MetricsStore, MonitorMetrics};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aggregator");

    let config = config::AggregatorConfig::load()?;
    info!(listen_port = config.listen_port, "Aggregator configured");

    // The store is constructed here and injected into every handler; there
    // is no process-wide singleton.
    let store = MetricsStore::new();
    let metrics = MonitorMetrics::new();
    let app_state = Arc::new(api::AppState::new(store, metrics));

    let api_handle = tokio::spawn(api::serve(config.listen_port, app_state));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    api_handle.abort();

    Ok(())
}
