//! Streaming anomaly detection and root-cause analysis library
//!
//! This crate provides the core functionality for:
//! - Per-metric anomaly scoring with half-space trees
//! - Alert classification and log correlation
//! - Rule-based optimization recommendations and their delivery
//! - Health checks and observability

pub mod anomaly;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod rca;
pub mod recommend;
pub mod sink;

pub use anomaly::{AlertThresholds, AlertTier, HalfSpaceTrees, ModelConfig, ModelRegistry};
pub use engine::{AnomalyEngine, EngineConfig, IngestLoop, IngestStats, SampleOutcome};
pub use error::{ConfigError, SinkError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use rca::{CorrelatedLog, LogCorrelationBuffer, RcaCorrelator};
pub use recommend::RecommendationGenerator;
pub use sink::{HttpSink, LogSink, PublishWorker, Publisher, RecommendationSink};
