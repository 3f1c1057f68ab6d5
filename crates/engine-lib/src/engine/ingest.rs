//! Telemetry ingest loop
//!
//! Consumes the merged metric and log stream and drives the engine one event
//! at a time, in arrival order.

use super::AnomalyEngine;
use crate::anomaly::AlertTier;
use crate::health::{components, HealthRegistry};
use crate::models::TelemetryEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Default channel buffer size for incoming telemetry
pub const DEFAULT_INGEST_CHANNEL_SIZE: usize = 1000;

/// Counters reported when the loop exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub metrics: u64,
    pub logs: u64,
    pub warnings: u64,
    pub alerts: u64,
}

/// Loop feeding telemetry events into the engine
pub struct IngestLoop {
    engine: Arc<AnomalyEngine>,
    events_rx: mpsc::Receiver<TelemetryEvent>,
    stats: IngestStats,
    health: Option<HealthRegistry>,
}

impl IngestLoop {
    /// Create the loop and the sender used by telemetry producers
    pub fn new(
        engine: Arc<AnomalyEngine>,
        buffer_size: usize,
    ) -> (Self, mpsc::Sender<TelemetryEvent>) {
        let (events_tx, events_rx) = mpsc::channel(buffer_size.max(1));

        let loop_instance = Self {
            engine,
            events_rx,
            stats: IngestStats::default(),
            health: None,
        };

        (loop_instance, events_tx)
    }

    /// Report the `scorer` component: healthy while running, unhealthy once stopped
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Process events until shutdown or until every sender is dropped
    ///
    /// Events still queued when shutdown arrives are left unprocessed.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> IngestStats {
        self.started().await;

        loop {
            tokio::select! {
                next = self.events_rx.recv() => {
                    match next {
                        Some(event) => self.handle(event),
                        None => {
                            debug!("Telemetry stream closed");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down telemetry ingest loop");
                    break;
                }
            }
        }

        self.stopped().await
    }

    /// Process every event until all senders are dropped
    pub async fn drain(mut self) -> IngestStats {
        self.started().await;

        while let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }
        debug!("Telemetry stream closed");

        self.stopped().await
    }

    async fn started(&self) {
        info!("Starting telemetry ingest loop");
        if let Some(health) = &self.health {
            health.set_healthy(components::SCORER).await;
        }
    }

    async fn stopped(self) -> IngestStats {
        info!(
            metrics = self.stats.metrics,
            logs = self.stats.logs,
            warnings = self.stats.warnings,
            alerts = self.stats.alerts,
            "Telemetry ingest loop stopped"
        );

        if let Some(health) = &self.health {
            health
                .set_unhealthy(components::SCORER, "ingest loop stopped")
                .await;
        }

        self.stats
    }

    fn handle(&mut self, event: TelemetryEvent) {
        match self.engine.handle_event(event) {
            Some(outcome) => {
                self.stats.metrics += 1;
                match outcome.tier {
                    AlertTier::Alert => self.stats.alerts += 1,
                    AlertTier::Warning => self.stats.warnings += 1,
                    AlertTier::Normal => {}
                }
            }
            None => self.stats.logs += 1,
        }

        let processed = self.stats.metrics + self.stats.logs;
        if processed % 10_000 == 0 {
            debug!(
                processed = processed,
                models = self.engine.registry().len(),
                log_buffer = self.engine.log_buffer().len(),
                "Ingest progress"
            );
        }
    }
}
