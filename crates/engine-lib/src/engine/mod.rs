//! Per-sample anomaly processing
//!
//! The engine owns every piece of mutable state: the model registry, the log
//! correlation buffer and the publish handle. Each metric sample is scored,
//! learned, classified and, on ALERT, correlated with recent error logs and
//! mapped to a recommendation. Nothing in this path returns an error.

mod ingest;

#[cfg(test)]
mod tests;

pub use ingest::{IngestLoop, IngestStats, DEFAULT_INGEST_CHANNEL_SIZE};

use crate::anomaly::{
    AlertThresholds, AlertTier, ModelConfig, ModelRegistry, DEFAULT_ANOMALY_THRESHOLD,
    DEFAULT_WARNING_THRESHOLD,
};
use crate::error::{check_range, ConfigError};
use crate::models::{LogRecord, MetricSample, Recommendation, TelemetryEvent};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::rca::{
    CorrelatedLog, LogCorrelationBuffer, RcaCorrelator, DEFAULT_LOG_BUFFER_CAPACITY,
    DEFAULT_MAX_CORRELATED,
};
use crate::recommend::{RecommendationGenerator, DEFAULT_SERVER_NAME};
use crate::sink::{Publisher, DEFAULT_PUBLISH_QUEUE_CAPACITY};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Engine configuration, read once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hyperparameters for every per-metric model
    pub model: ModelConfig,
    /// Scores strictly above this raise an ALERT
    pub anomaly_threshold: f64,
    /// Scores strictly above this (and not an ALERT) raise a WARNING
    pub warning_threshold: f64,
    /// Number of recent log records kept for correlation
    pub log_buffer_capacity: usize,
    /// Distinct error messages attached to one alert
    pub max_correlated_logs: usize,
    /// Recommendations waiting for the sink before new ones are dropped
    pub publish_queue_capacity: usize,
    /// Value of the `server` field on recommendations
    pub server_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            log_buffer_capacity: DEFAULT_LOG_BUFFER_CAPACITY,
            max_correlated_logs: DEFAULT_MAX_CORRELATED,
            publish_queue_capacity: DEFAULT_PUBLISH_QUEUE_CAPACITY,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Check every field against its supported range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        check_range("anomaly_threshold", self.anomaly_threshold, 0.0, 1.0)?;
        check_range("warning_threshold", self.warning_threshold, 0.0, 1.0)?;
        check_range(
            "log_buffer_capacity",
            self.log_buffer_capacity as f64,
            100.0,
            10_000.0,
        )?;

        if self.warning_threshold > self.anomaly_threshold {
            return Err(ConfigError::ThresholdOrder {
                warning: self.warning_threshold,
                anomaly: self.anomaly_threshold,
            });
        }

        Ok(())
    }

    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds::new(self.anomaly_threshold, self.warning_threshold)
    }
}

/// Result of processing one metric sample
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub metric: String,
    pub value: f64,
    pub timestamp: i64,
    pub score: f64,
    pub tier: AlertTier,
    /// Error logs correlated with an ALERT, newest first
    pub correlated: Vec<CorrelatedLog>,
    pub recommendation: Option<Recommendation>,
    /// Whether the recommendation was accepted by the publish queue
    pub queued: bool,
}

/// Anomaly detection, RCA and recommendation engine
pub struct AnomalyEngine {
    config: EngineConfig,
    registry: ModelRegistry,
    logs: LogCorrelationBuffer,
    thresholds: AlertThresholds,
    correlator: RcaCorrelator,
    recommender: RecommendationGenerator,
    publisher: Publisher,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl AnomalyEngine {
    /// Build an engine from a validated configuration
    pub fn new(
        config: EngineConfig,
        publisher: Publisher,
        logger: StructuredLogger,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            registry: ModelRegistry::new(config.model),
            logs: LogCorrelationBuffer::new(config.log_buffer_capacity),
            thresholds: config.thresholds(),
            correlator: RcaCorrelator::new(config.max_correlated_logs),
            recommender: RecommendationGenerator::new(config.server_name.clone()),
            publisher,
            metrics: EngineMetrics::new(),
            logger,
            config,
        })
    }

    pub fn builder() -> AnomalyEngineBuilder {
        AnomalyEngineBuilder::new()
    }

    /// Score, learn and classify one sample, acting on ALERT
    pub fn process_metric(&self, sample: &MetricSample) -> SampleOutcome {
        let start = Instant::now();

        let model = self.registry.get_or_create(&sample.name);
        let score = {
            let mut model = model.lock();
            let score = model.score_one(sample.value);
            model.learn_one(sample.value);
            score
        };

        self.metrics.observe_scoring_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_samples_processed();
        self.metrics.set_models_active(self.registry.len() as i64);

        let tier = self.thresholds.classify(score);
        self.metrics.record_tier(tier);
        self.logger.log_score(&sample.name, sample.value, score, tier);

        let mut outcome = SampleOutcome {
            metric: sample.name.clone(),
            value: sample.value,
            timestamp: sample.timestamp,
            score,
            tier,
            correlated: Vec::new(),
            recommendation: None,
            queued: false,
        };

        if tier != AlertTier::Alert {
            return outcome;
        }

        outcome.correlated = self.correlator.correlate(&self.logs);
        self.logger.log_correlation(&sample.name, sample.value, &outcome.correlated);

        match self.recommender.generate(&sample.name, sample.value) {
            Some(recommendation) => {
                self.metrics.inc_recommendations_generated();
                self.logger.log_recommendation(
                    &sample.name,
                    recommendation.id,
                    &recommendation.title,
                    &recommendation.impact.to_string(),
                );
                outcome.queued = self.publisher.publish(recommendation.clone());
                outcome.recommendation = Some(recommendation);
            }
            None => {
                self.logger.log_recommendation_missing(&sample.name, sample.value);
            }
        }

        outcome
    }

    /// Append a log record to the correlation buffer
    pub fn ingest_log(&self, record: LogRecord) {
        self.logs.push(record);
        self.metrics.inc_logs_ingested();
        self.metrics.set_log_buffer_items(self.logs.len() as i64);
    }

    /// Dispatch one event from the merged telemetry stream
    pub fn handle_event(&self, event: TelemetryEvent) -> Option<SampleOutcome> {
        match event {
            TelemetryEvent::Metric(sample) => Some(self.process_metric(&sample)),
            TelemetryEvent::Log(record) => {
                self.ingest_log(record);
                None
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn log_buffer(&self) -> &LogCorrelationBuffer {
        &self.logs
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }
}

/// Builder for the anomaly engine
pub struct AnomalyEngineBuilder {
    config: EngineConfig,
    publisher: Option<Publisher>,
    logger: Option<StructuredLogger>,
}

impl AnomalyEngineBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            publisher: None,
            logger: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<AnomalyEngine> {
        let publisher = self
            .publisher
            .ok_or_else(|| anyhow::anyhow!("Publisher is required"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new(self.config.server_name.clone()));

        Ok(AnomalyEngine::new(self.config, publisher, logger)?)
    }
}

impl Default for AnomalyEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
