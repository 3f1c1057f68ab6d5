//! Engine configuration

use anyhow::{Context, Result};
use engine_lib::{
    anomaly::{ModelConfig, DEFAULT_ANOMALY_THRESHOLD, DEFAULT_WARNING_THRESHOLD},
    engine::EngineConfig,
    rca::{DEFAULT_LOG_BUFFER_CAPACITY, DEFAULT_MAX_CORRELATED},
    recommend::DEFAULT_SERVER_NAME,
    sink::{DEFAULT_PUBLISH_QUEUE_CAPACITY, DEFAULT_SINK_TIMEOUT},
};
use serde::Deserialize;
use std::time::Duration;

/// Process settings, read from `RCA_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Trees per metric model
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Depth of every tree
    #[serde(default = "default_height")]
    pub height: usize,

    /// Samples per reference window
    #[serde(default = "default_window_size")]
    pub window_size: u64,

    /// Seed for split point generation
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    #[serde(default = "default_log_buffer_capacity")]
    pub log_buffer_capacity: usize,

    #[serde(default = "default_max_correlated_logs")]
    pub max_correlated_logs: usize,

    #[serde(default = "default_publish_queue_capacity")]
    pub publish_queue_capacity: usize,

    /// Server name stamped on recommendations and log lines
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// API server port for ingestion, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Webhook receiving recommendations; logged only when unset
    #[serde(default)]
    pub sink_url: Option<String>,

    #[serde(default = "default_sink_timeout_ms")]
    pub sink_timeout_ms: u64,
}

fn default_n_trees() -> usize {
    ModelConfig::default().n_trees
}

fn default_height() -> usize {
    ModelConfig::default().height
}

fn default_window_size() -> u64 {
    ModelConfig::default().window_size
}

fn default_seed() -> u64 {
    ModelConfig::default().seed
}

fn default_anomaly_threshold() -> f64 {
    DEFAULT_ANOMALY_THRESHOLD
}

fn default_warning_threshold() -> f64 {
    DEFAULT_WARNING_THRESHOLD
}

fn default_log_buffer_capacity() -> usize {
    DEFAULT_LOG_BUFFER_CAPACITY
}

fn default_max_correlated_logs() -> usize {
    DEFAULT_MAX_CORRELATED
}

fn default_publish_queue_capacity() -> usize {
    DEFAULT_PUBLISH_QUEUE_CAPACITY
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_sink_timeout_ms() -> u64 {
    DEFAULT_SINK_TIMEOUT.as_millis() as u64
}

impl EngineSettings {
    /// Load settings from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RCA").try_parsing(true))
            .build()?;

        config
            .try_deserialize()
            .context("Invalid RCA_* environment configuration")
    }

    /// Engine configuration, validated
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig {
            model: ModelConfig {
                n_trees: self.n_trees,
                height: self.height,
                window_size: self.window_size,
                seed: self.seed,
            },
            anomaly_threshold: self.anomaly_threshold,
            warning_threshold: self.warning_threshold,
            log_buffer_capacity: self.log_buffer_capacity,
            max_correlated_logs: self.max_correlated_logs,
            publish_queue_capacity: self.publish_queue_capacity,
            server_name: self.server_name.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}
