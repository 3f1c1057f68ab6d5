//! Streaming anomaly detection for metric samples
//!
//! This module provides:
//! - Half-space-tree ensembles scoring each sample against a sliding reference window
//! - A registry holding one model per metric name
//! - Alert tier classification of scores

mod classifier;
mod half_space;
mod registry;

pub use classifier::{
    classify, AlertThresholds, AlertTier, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_WARNING_THRESHOLD,
};
pub use half_space::{HalfSpaceTrees, ModelConfig};
pub use registry::{ModelHandle, ModelRegistry};
