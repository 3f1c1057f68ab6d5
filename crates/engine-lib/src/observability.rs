//! Observability infrastructure for the anomaly engine
//!
//! Provides:
//! - Prometheus metrics (samples, alert tiers, recommendation delivery, scoring latency)
//! - Structured JSON logging with tracing

use crate::anomaly::AlertTier;
use crate::rca::CorrelatedLog;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-sample scoring latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    scoring_latency_seconds: Histogram,
    samples_processed: IntCounter,
    logs_ingested: IntCounter,
    warnings: IntCounter,
    alerts: IntCounter,
    recommendations_generated: IntCounter,
    recommendations_published: IntCounter,
    recommendations_dropped: IntCounter,
    publish_failures: IntCounter,
    models_active: IntGauge,
    log_buffer_items: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            scoring_latency_seconds: register_histogram!(
                "rca_engine_scoring_latency_seconds",
                "Time spent scoring and learning one metric sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scoring_latency_seconds"),

            samples_processed: register_int_counter!(
                "rca_engine_samples_processed_total",
                "Metric samples scored by the engine"
            )
            .expect("Failed to register samples_processed"),

            logs_ingested: register_int_counter!(
                "rca_engine_logs_ingested_total",
                "Log records appended to the correlation buffer"
            )
            .expect("Failed to register logs_ingested"),

            warnings: register_int_counter!(
                "rca_engine_warnings_total",
                "Samples classified as WARNING"
            )
            .expect("Failed to register warnings"),

            alerts: register_int_counter!(
                "rca_engine_alerts_total",
                "Samples classified as ALERT"
            )
            .expect("Failed to register alerts"),

            recommendations_generated: register_int_counter!(
                "rca_engine_recommendations_generated_total",
                "Recommendations produced by the rule table"
            )
            .expect("Failed to register recommendations_generated"),

            recommendations_published: register_int_counter!(
                "rca_engine_recommendations_published_total",
                "Recommendations accepted by the sink"
            )
            .expect("Failed to register recommendations_published"),

            recommendations_dropped: register_int_counter!(
                "rca_engine_recommendations_dropped_total",
                "Recommendations dropped before reaching the sink"
            )
            .expect("Failed to register recommendations_dropped"),

            publish_failures: register_int_counter!(
                "rca_engine_publish_failures_total",
                "Recommendation deliveries rejected or failed by the sink"
            )
            .expect("Failed to register publish_failures"),

            models_active: register_int_gauge!(
                "rca_engine_models_active",
                "Number of per-metric anomaly models"
            )
            .expect("Failed to register models_active"),

            log_buffer_items: register_int_gauge!(
                "rca_engine_log_buffer_items",
                "Log records currently held for correlation"
            )
            .expect("Failed to register log_buffer_items"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_scoring_latency(&self, duration_secs: f64) {
        self.inner().scoring_latency_seconds.observe(duration_secs);
    }

    pub fn inc_samples_processed(&self) {
        self.inner().samples_processed.inc();
    }

    pub fn inc_logs_ingested(&self) {
        self.inner().logs_ingested.inc();
    }

    /// Count a classified sample; NORMAL is not counted separately
    pub fn record_tier(&self, tier: AlertTier) {
        match tier {
            AlertTier::Alert => self.inner().alerts.inc(),
            AlertTier::Warning => self.inner().warnings.inc(),
            AlertTier::Normal => {}
        }
    }

    pub fn inc_recommendations_generated(&self) {
        self.inner().recommendations_generated.inc();
    }

    pub fn inc_recommendations_published(&self) {
        self.inner().recommendations_published.inc();
    }

    pub fn inc_recommendations_dropped(&self) {
        self.inner().recommendations_dropped.inc();
    }

    pub fn inc_publish_failures(&self) {
        self.inner().publish_failures.inc();
    }

    pub fn set_models_active(&self, count: i64) {
        self.inner().models_active.set(count);
    }

    pub fn set_log_buffer_items(&self, count: i64) {
        self.inner().log_buffer_items.set(count);
    }
}

/// Structured logger for engine events
///
/// Provides consistent JSON-formatted logging for alerts, correlated logs,
/// recommendations and delivery problems.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a non-normal classification
    pub fn log_score(&self, metric: &str, value: f64, score: f64, tier: AlertTier) {
        let score_text = format!("{:.4}", score);
        match tier {
            AlertTier::Alert => {
                warn!(
                    event = "anomaly_alert",
                    node = %self.node_name,
                    metric = %metric,
                    value = value,
                    score = %score_text,
                    tier = %tier,
                    "Anomaly alert"
                );
            }
            AlertTier::Warning => {
                info!(
                    event = "anomaly_warning",
                    node = %self.node_name,
                    metric = %metric,
                    value = value,
                    score = %score_text,
                    tier = %tier,
                    "Anomaly warning"
                );
            }
            AlertTier::Normal => {}
        }
    }

    /// Log the diagnostic context found for an alert
    pub fn log_correlation(&self, metric: &str, value: f64, correlated: &[CorrelatedLog]) {
        if correlated.is_empty() {
            info!(
                event = "rca_no_correlated_logs",
                node = %self.node_name,
                metric = %metric,
                value = value,
                "No recent error logs associated with anomaly"
            );
            return;
        }

        for (rank, entry) in correlated.iter().enumerate() {
            info!(
                event = "rca_correlated_log",
                node = %self.node_name,
                metric = %metric,
                value = value,
                rank = rank,
                severity = %entry.severity,
                message = %entry.message,
                "Recent error log associated with anomaly"
            );
        }
    }

    pub fn log_recommendation(&self, metric: &str, id: i64, title: &str, impact: &str) {
        info!(
            event = "recommendation_generated",
            node = %self.node_name,
            metric = %metric,
            recommendation_id = id,
            title = %title,
            impact = %impact,
            "Generated recommendation"
        );
    }

    /// Alert without a matching recommendation rule
    pub fn log_recommendation_missing(&self, metric: &str, value: f64) {
        info!(
            event = "recommendation_missing",
            node = %self.node_name,
            metric = %metric,
            value = value,
            "No recommendation rule for alerting metric"
        );
    }

    pub fn log_publish_failure(&self, id: i64, sink: &str, error: &str) {
        warn!(
            event = "recommendation_publish_failed",
            node = %self.node_name,
            recommendation_id = id,
            sink = %sink,
            error = %error,
            "Failed to publish recommendation, not retrying"
        );
    }

    pub fn log_recommendation_dropped(&self, id: i64, title: &str, reason: &str) {
        warn!(
            event = "recommendation_dropped",
            node = %self.node_name,
            recommendation_id = id,
            title = %title,
            reason = %reason,
            "Dropped recommendation before delivery"
        );
    }

    /// Log engine startup
    pub fn log_startup(&self, version: &str, n_trees: usize, height: usize, window_size: u64) {
        info!(
            event = "engine_started",
            node = %self.node_name,
            engine_version = %version,
            n_trees = n_trees,
            height = height,
            window_size = window_size,
            "Anomaly detection and RCA engine started"
        );
    }

    /// Log engine shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Anomaly detection and RCA engine shutting down"
        );
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        let metrics = EngineMetrics::new();

        metrics.observe_scoring_latency(0.00002);
        metrics.inc_samples_processed();
        metrics.inc_logs_ingested();
        metrics.record_tier(AlertTier::Alert);
        metrics.record_tier(AlertTier::Normal);
        metrics.set_models_active(3);
        metrics.set_log_buffer_items(10);

        // Clones share the global instance
        let clone = metrics.clone();
        clone.inc_recommendations_generated();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name(), "test-node");
    }
}
