//! Alert tier classification for anomaly scores

use serde::{Deserialize, Serialize};

/// Default score above which a sample raises an alert
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.8;

/// Default score above which a sample is reported as a warning
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.5;

/// Outcome tier for a scored sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertTier {
    Normal,
    Warning,
    Alert,
}

impl std::fmt::Display for AlertTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertTier::Normal => write!(f, "NORMAL"),
            AlertTier::Warning => write!(f, "WARNING"),
            AlertTier::Alert => write!(f, "ALERT"),
        }
    }
}

/// Classify a score with strict greater-than comparisons
///
/// A score exactly on a threshold falls into the lower tier.
pub fn classify(score: f64, anomaly_threshold: f64, warning_threshold: f64) -> AlertTier {
    if score > anomaly_threshold {
        AlertTier::Alert
    } else if score > warning_threshold {
        AlertTier::Warning
    } else {
        AlertTier::Normal
    }
}

/// Configured threshold pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub anomaly: f64,
    pub warning: f64,
}

impl AlertThresholds {
    pub fn new(anomaly: f64, warning: f64) -> Self {
        Self { anomaly, warning }
    }

    pub fn classify(&self, score: f64) -> AlertTier {
        classify(score, self.anomaly, self.warning)
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self::new(DEFAULT_ANOMALY_THRESHOLD, DEFAULT_WARNING_THRESHOLD)
    }
}
