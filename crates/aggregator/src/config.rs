//! Aggregator configuration

use anyhow::Result;
use serde::Deserialize;

/// Aggregator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Port the query/ingestion API listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_port() -> u16 {
    8080
}

impl AggregatorConfig {
    /// Load configuration from the environment (`AGGREGATOR_` prefix)
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGGREGATOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AggregatorConfig {
            listen_port: default_listen_port(),
        }))
    }
}
