//! Core data models for the anomaly engine

use serde::{Deserialize, Serialize};

/// A single metric observation delivered by the ingestion adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub timestamp: i64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

/// A log line kept for root-cause correlation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: i64,
    pub severity: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: i64, severity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity: severity.into(),
            message: message.into(),
        }
    }
}

/// Expected impact of applying a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Low => write!(f, "low"),
            Impact::Medium => write!(f, "medium"),
            Impact::High => write!(f, "high"),
        }
    }
}

/// Optimization recommendation emitted on an anomaly alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub details: String,
    pub impact: Impact,
    pub category: String,
    pub confidence: f64,
    pub estimated_improvement: String,
    pub current_config: String,
    pub suggested_config: String,
    pub server: String,
    pub timestamp: i64,
}

/// Merged telemetry stream item consumed by the ingest loop
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Metric(MetricSample),
    Log(LogRecord),
}
