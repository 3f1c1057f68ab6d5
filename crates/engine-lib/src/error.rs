//! Error types shared across the engine

use thiserror::Error;

/// Invalid engine configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("warning_threshold ({warning}) must not exceed anomaly_threshold ({anomaly})")]
    ThresholdOrder { warning: f64, anomaly: f64 },
}

/// Inclusive range check; NaN is out of range
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// Failure to hand a recommendation to the downstream sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request to recommendation sink failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("recommendation sink responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("recommendation sink is closed")]
    Closed,
}
