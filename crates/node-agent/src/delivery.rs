//! HTTP sample delivery to the aggregator
//!
//! One POST per sample, bounded by a short client timeout so a stalled
//! aggregator cannot block the next tick. Failures surface to the sampling
//! loop, which logs and drops them; the next tick re-attempts naturally.

use anyhow::{Context, Result};
use async_trait::async_trait;
use monitor_lib::collector::SampleSink;
use monitor_lib::{NodeSample, PodSample};
use reqwest::Client;
use serde::Serialize;
use url::Url;

/// Sink that posts samples to the aggregator's ingestion endpoints
pub struct HttpSink {
    client: Client,
    base_url: Url,
}

impl HttpSink {
    /// Create a sink for the given aggregator base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid aggregator URL")?;

        Ok(Self { client, base_url })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send sample")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Aggregator rejected sample ({}): {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl SampleSink for HttpSink {
    async fn deliver_node(&self, sample: &NodeSample) -> Result<()> {
        self.post(&format!("api/nodes/{}", sample.node), sample).await
    }

    async fn deliver_pod(&self, sample: &PodSample) -> Result<()> {
        self.post(&format!("api/pods/{}", sample.pod), sample).await
    }
}
