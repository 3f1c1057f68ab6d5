//! Fire-and-forget publish queue
//!
//! The processing path hands recommendations to a bounded channel without
//! waiting on the sink. A background worker delivers them in order; failed
//! deliveries are logged and dropped, a full queue drops the new entry.

use super::RecommendationSink;
use crate::health::{components, HealthRegistry};
use crate::models::Recommendation;
use crate::observability::{EngineMetrics, StructuredLogger};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Default number of recommendations waiting for delivery
pub const DEFAULT_PUBLISH_QUEUE_CAPACITY: usize = 256;

/// Delivery counters shared by the publisher and its worker
#[derive(Debug, Default)]
struct PublishCounters {
    queued: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of delivery counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub queued: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Non-blocking handle used by the processing path
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Recommendation>,
    counters: Arc<PublishCounters>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl Publisher {
    /// Create a publisher and the worker that drains it into `sink`
    pub fn new(
        capacity: usize,
        sink: Arc<dyn RecommendationSink>,
        logger: StructuredLogger,
    ) -> (Self, PublishWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(PublishCounters::default());
        let metrics = EngineMetrics::new();

        let publisher = Self {
            tx,
            counters: Arc::clone(&counters),
            metrics: metrics.clone(),
            logger: logger.clone(),
        };

        let worker = PublishWorker {
            rx,
            delivery: Delivery {
                sink,
                counters,
                metrics,
                logger,
                health: None,
            },
        };

        (publisher, worker)
    }

    /// Queue a recommendation; returns false if it was dropped
    pub fn publish(&self, recommendation: Recommendation) -> bool {
        match self.tx.try_send(recommendation) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(rec)) => {
                self.drop_recommendation(&rec, "publish queue full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(rec)) => {
                self.drop_recommendation(&rec, "publish worker stopped");
                false
            }
        }
    }

    fn drop_recommendation(&self, recommendation: &Recommendation, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_recommendations_dropped();
        self.logger
            .log_recommendation_dropped(recommendation.id, &recommendation.title, reason);
    }

    pub fn stats(&self) -> PublishStats {
        PublishStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Background task delivering queued recommendations to the sink
pub struct PublishWorker {
    rx: mpsc::Receiver<Recommendation>,
    delivery: Delivery,
}

struct Delivery {
    sink: Arc<dyn RecommendationSink>,
    counters: Arc<PublishCounters>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl PublishWorker {
    /// Report sink health to the registry after each delivery
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.delivery.health = Some(health);
        self
    }

    /// Deliver until shutdown or until every publisher is dropped
    ///
    /// Recommendations still queued at shutdown are delivered before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(sink = %self.delivery.sink.name(), "Starting recommendation publish worker");

        loop {
            tokio::select! {
                next = self.rx.recv() => {
                    match next {
                        Some(recommendation) => self.delivery.deliver(recommendation).await,
                        None => {
                            debug!("All publishers dropped, stopping publish worker");
                            return;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down publish worker");
                    break;
                }
            }
        }

        self.rx.close();
        while let Some(recommendation) = self.rx.recv().await {
            self.delivery.deliver(recommendation).await;
        }
    }
}

impl Delivery {
    async fn deliver(&self, recommendation: Recommendation) {
        match self.sink.publish(&recommendation).await {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                self.metrics.inc_recommendations_published();
                debug!(
                    recommendation_id = recommendation.id,
                    sink = %self.sink.name(),
                    "Recommendation delivered"
                );
                if let Some(health) = &self.health {
                    health.set_healthy(components::SINK).await;
                }
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.inc_publish_failures();
                self.logger.log_publish_failure(
                    recommendation.id,
                    self.sink.name(),
                    &e.to_string(),
                );
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SINK, format!("publish failed: {}", e))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::health::ComponentStatus;
    use crate::models::Impact;
    use crate::sink::ChannelSink;
    use async_trait::async_trait;

    fn recommendation(id: i64) -> Recommendation {
        Recommendation {
            id,
            title: "Optimize Worker Connections".to_string(),
            description: String::new(),
            details: String::new(),
            impact: Impact::Medium,
            category: "Performance".to_string(),
            confidence: 0.75,
            estimated_improvement: "+20% throughput".to_string(),
            current_config: String::new(),
            suggested_config: String::new(),
            server: "nginx-prod-01".to_string(),
            timestamp: 0,
        }
    }

    /// Sink failing every odd id
    struct FlakySink;

    #[async_trait]
    impl RecommendationSink for FlakySink {
        async fn publish(&self, recommendation: &Recommendation) -> Result<(), SinkError> {
            if recommendation.id % 2 == 1 {
                Err(SinkError::Closed)
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let (sink, mut received) = ChannelSink::new();
        let (publisher, worker) =
            Publisher::new(16, Arc::new(sink), StructuredLogger::new("test-node"));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(shutdown_rx));

        for id in 1..=3 {
            assert!(publisher.publish(recommendation(id)));
        }

        for id in 1..=3 {
            assert_eq!(received.recv().await.unwrap().id, id);
        }

        drop(publisher);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let health = HealthRegistry::new();
        health.register(components::SINK).await;

        let (publisher, worker) =
            Publisher::new(16, Arc::new(FlakySink), StructuredLogger::new("test-node"));
        let worker = worker.with_health(health.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for id in 1..=4 {
            publisher.publish(recommendation(id));
        }
        shutdown_tx.send(()).unwrap();

        worker.run(shutdown_rx).await;

        let stats = publisher.stats();
        assert_eq!(stats.queued, 4);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.failed, 2);

        // Last delivery (id 4) succeeded
        let report = health.health().await;
        assert_eq!(report.components[components::SINK].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (sink, _received) = ChannelSink::new();
        let (publisher, _worker) =
            Publisher::new(1, Arc::new(sink), StructuredLogger::new("test-node"));

        assert!(publisher.publish(recommendation(1)));
        assert!(!publisher.publish(recommendation(2)));

        let stats = publisher.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let (sink, mut received) = ChannelSink::new();
        let (publisher, worker) =
            Publisher::new(16, Arc::new(sink), StructuredLogger::new("test-node"));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        publisher.publish(recommendation(10));
        publisher.publish(recommendation(12));
        shutdown_tx.send(()).unwrap();

        worker.run(shutdown_rx).await;

        assert_eq!(received.recv().await.unwrap().id, 10);
        assert_eq!(received.recv().await.unwrap().id, 12);
    }
}
