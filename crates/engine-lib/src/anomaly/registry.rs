//! Per-metric model registry
//!
//! Maps metric names to independent half-space-tree models. Models are
//! created lazily on first sight and live for the rest of the process.

use super::{HalfSpaceTrees, ModelConfig};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Shared handle to one metric's model; access is serialized by the mutex
#[derive(Debug, Clone)]
pub struct ModelHandle {
    inner: Arc<Mutex<HalfSpaceTrees>>,
}

impl ModelHandle {
    fn new(model: HalfSpaceTrees) -> Self {
        Self {
            inner: Arc::new(Mutex::new(model)),
        }
    }

    /// Lock the model for a score-then-learn step
    pub fn lock(&self) -> MutexGuard<'_, HalfSpaceTrees> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when both handles point at the same model instance
    pub fn ptr_eq(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Registry of per-metric anomaly models
pub struct ModelRegistry {
    models: DashMap<String, ModelHandle>,
    config: ModelConfig,
}

impl ModelRegistry {
    /// Create an empty registry; every model is built with `config`
    ///
    /// `config` must pass [`ModelConfig::validate`]; debug builds assert it.
    pub fn new(config: ModelConfig) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "model config out of range: {:?}",
            config
        );
        Self {
            models: DashMap::new(),
            config,
        }
    }

    /// Return the model for `metric_name`, building it on first access
    ///
    /// The entry API holds the shard lock across lookup and insert, so
    /// concurrent first access constructs exactly one model.
    pub fn get_or_create(&self, metric_name: &str) -> ModelHandle {
        if let Some(handle) = self.models.get(metric_name) {
            return handle.value().clone();
        }

        self.models
            .entry(metric_name.to_string())
            .or_insert_with(|| {
                debug!(metric = %metric_name, "Creating anomaly model");
                ModelHandle::new(HalfSpaceTrees::new(self.config))
            })
            .value()
            .clone()
    }

    /// Look up an existing model without creating one
    pub fn get(&self, metric_name: &str) -> Option<ModelHandle> {
        self.models.get(metric_name).map(|r| r.value().clone())
    }

    /// Names of all metrics seen so far
    pub fn metric_names(&self) -> Vec<String> {
        self.models.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
