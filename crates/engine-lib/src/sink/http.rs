//! Webhook sink for recommendations

use super::RecommendationSink;
use crate::error::SinkError;
use crate::models::Recommendation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default timeout for one publish request
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each recommendation as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    /// Create a sink with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RecommendationSink for HttpSink {
    async fn publish(&self, recommendation: &Recommendation) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(recommendation)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
