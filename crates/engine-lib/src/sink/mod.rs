//! Recommendation delivery
//!
//! This module provides:
//! - The `RecommendationSink` trait implemented by delivery backends
//! - A webhook sink posting JSON over HTTP with a bounded timeout
//! - A bounded publish queue drained by a background worker

mod http;
mod publisher;

pub use http::{HttpSink, DEFAULT_SINK_TIMEOUT};
pub use publisher::{PublishStats, PublishWorker, Publisher, DEFAULT_PUBLISH_QUEUE_CAPACITY};

use crate::error::SinkError;
use crate::models::Recommendation;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

/// Destination for generated recommendations
///
/// Delivery is best effort: a failed publish is reported once and never
/// retried by the caller.
#[async_trait]
pub trait RecommendationSink: Send + Sync {
    async fn publish(&self, recommendation: &Recommendation) -> Result<(), SinkError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Sink that only logs recommendations
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl RecommendationSink for LogSink {
    async fn publish(&self, recommendation: &Recommendation) -> Result<(), SinkError> {
        info!(
            event = "recommendation_published",
            recommendation_id = recommendation.id,
            title = %recommendation.title,
            impact = %recommendation.impact,
            payload = %serde_json::to_string(recommendation).unwrap_or_default(),
            "Recommendation published to log sink"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Sink forwarding recommendations into an in-process channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Recommendation>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Recommendation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RecommendationSink for ChannelSink {
    async fn publish(&self, recommendation: &Recommendation) -> Result<(), SinkError> {
        self.tx
            .send(recommendation.clone())
            .map_err(|_| SinkError::Closed)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Impact;
    use tokio_test::{assert_err, assert_ok, block_on};

    fn recommendation() -> Recommendation {
        Recommendation {
            id: 7,
            title: "Enable Micro-Caching".to_string(),
            description: String::new(),
            details: String::new(),
            impact: Impact::High,
            category: "Performance".to_string(),
            confidence: 0.89,
            estimated_improvement: "-40% latency".to_string(),
            current_config: "proxy_cache off;".to_string(),
            suggested_config: "proxy_cache_valid 200 1s;".to_string(),
            server: "nginx-prod-01".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        assert_ok!(block_on(LogSink.publish(&recommendation())));
        assert_eq!(LogSink.name(), "log");
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();

        assert_ok!(block_on(sink.publish(&recommendation())));
        assert_eq!(rx.try_recv().unwrap().id, 7);

        drop(rx);
        assert_err!(block_on(sink.publish(&recommendation())));
    }
}
