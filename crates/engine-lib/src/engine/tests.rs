//! End-to-end tests for the processing path
//!
//! Samples flow through the real registry, correlator and recommendation
//! rules; recommendations are collected through an in-process channel sink.

use super::*;
use crate::anomaly::ModelConfig;
use crate::error::ConfigError;
use crate::health::{components, ComponentStatus, HealthRegistry};
use crate::models::Impact;
use crate::rca::CorrelatedLog;
use crate::sink::{ChannelSink, PublishWorker};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

fn test_config() -> EngineConfig {
    EngineConfig {
        model: ModelConfig {
            n_trees: 10,
            height: 8,
            window_size: 50,
            seed: 42,
        },
        ..EngineConfig::default()
    }
}

fn engine_with_channel(
    config: EngineConfig,
) -> (AnomalyEngine, PublishWorker, mpsc::UnboundedReceiver<Recommendation>) {
    let logger = StructuredLogger::new("test-node");
    let (sink, received) = ChannelSink::new();
    let (publisher, worker) = Publisher::new(16, Arc::new(sink), logger.clone());
    let engine = AnomalyEngine::new(config, publisher, logger).unwrap();
    (engine, worker, received)
}

/// Feed a constant value for two full windows; every sample must stay NORMAL
fn warm_up(engine: &AnomalyEngine, metric: &str) {
    let window = engine.config().model.window_size;
    for i in 0..(window * 2) {
        let outcome = engine.process_metric(&MetricSample::new(metric, 120.0, i as i64));
        assert_eq!(outcome.tier, AlertTier::Normal, "warm-up sample {} alerted", i);
    }
}

#[test]
fn test_default_config_is_valid() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn test_config_rejects_out_of_range_values() {
    let mut config = test_config();
    config.model.n_trees = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange { field: "n_trees", .. })
    ));

    let mut config = test_config();
    config.model.window_size = 10;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OutOfRange { field: "window_size", .. })
    ));

    let mut config = test_config();
    config.anomaly_threshold = f64::NAN;
    assert!(config.validate().is_err());

    let mut config = test_config();
    config.log_buffer_capacity = 20_000;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_inverted_thresholds() {
    let mut config = test_config();
    config.anomaly_threshold = 0.4;
    config.warning_threshold = 0.6;

    assert_eq!(
        config.validate(),
        Err(ConfigError::ThresholdOrder {
            warning: 0.6,
            anomaly: 0.4,
        })
    );
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"anomaly_threshold": 0.9, "model": {"n_trees": 25}}"#).unwrap();

    assert_eq!(config.anomaly_threshold, 0.9);
    assert_eq!(config.warning_threshold, DEFAULT_WARNING_THRESHOLD);
    assert_eq!(config.model.n_trees, 25);
    assert_eq!(config.model.height, ModelConfig::default().height);
    assert_eq!(config.server_name, DEFAULT_SERVER_NAME);
}

#[test]
fn test_builder_requires_publisher() {
    assert!(AnomalyEngine::builder().config(test_config()).build().is_err());
}

#[test]
fn test_first_sample_scores_zero() {
    let (engine, _worker, _received) = engine_with_channel(test_config());

    let outcome = engine.process_metric(&MetricSample::new("nginx_request_time_ms", 5e6, 1));

    assert_eq!(outcome.score, 0.0);
    assert_eq!(outcome.tier, AlertTier::Normal);
    assert!(outcome.recommendation.is_none());
}

#[tokio::test]
async fn test_alert_correlates_logs_and_publishes_recommendation() {
    let (engine, worker, mut received) = engine_with_channel(test_config());
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(worker.run(shutdown_rx));

    engine.ingest_log(LogRecord::new(1, "INFO", "worker started"));
    engine.ingest_log(LogRecord::new(2, "ERROR", "disk full"));
    engine.ingest_log(LogRecord::new(3, "FATAL", "oom"));

    warm_up(&engine, "nginx_request_time_ms");

    let outcome = engine.process_metric(&MetricSample::new("nginx_request_time_ms", 1e9, 1000));

    assert_eq!(outcome.tier, AlertTier::Alert);
    assert!(outcome.score > 0.8);
    assert_eq!(
        outcome.correlated,
        vec![
            CorrelatedLog {
                severity: "FATAL".to_string(),
                message: "oom".to_string(),
            },
            CorrelatedLog {
                severity: "ERROR".to_string(),
                message: "disk full".to_string(),
            },
        ]
    );

    let recommendation = outcome.recommendation.expect("request time has a rule");
    assert_eq!(recommendation.title, "Enable Micro-Caching");
    assert_eq!(recommendation.impact, Impact::High);
    assert!(outcome.queued);

    let delivered = received.recv().await.unwrap();
    assert_eq!(delivered, recommendation);
}

#[test]
fn test_alert_without_matching_rule_has_no_recommendation() {
    let (engine, _worker, _received) = engine_with_channel(test_config());

    warm_up(&engine, "disk_free_bytes");
    let outcome = engine.process_metric(&MetricSample::new("disk_free_bytes", -1e12, 500));

    assert_eq!(outcome.tier, AlertTier::Alert);
    assert!(outcome.correlated.is_empty());
    assert!(outcome.recommendation.is_none());
    assert_eq!(engine.publisher().stats().queued, 0);
}

#[test]
fn test_warning_takes_no_action() {
    let mut config = test_config();
    config.anomaly_threshold = 1.0;
    let (engine, _worker, _received) = engine_with_channel(config);

    engine.ingest_log(LogRecord::new(1, "ERROR", "upstream timed out"));
    warm_up(&engine, "cpu_usage_percent");

    let outcome = engine.process_metric(&MetricSample::new("cpu_usage_percent", 1e9, 500));

    assert_eq!(outcome.tier, AlertTier::Warning);
    assert!(outcome.correlated.is_empty());
    assert!(outcome.recommendation.is_none());
    assert_eq!(engine.publisher().stats().queued, 0);
}

#[test]
fn test_each_metric_gets_its_own_model() {
    let (engine, _worker, _received) = engine_with_channel(test_config());

    warm_up(&engine, "cpu_usage_percent");
    engine.process_metric(&MetricSample::new("memory_used_bytes", 1e9, 1));

    assert_eq!(engine.registry().len(), 2);
    let cpu = engine.registry().get("cpu_usage_percent").unwrap();
    let memory = engine.registry().get("memory_used_bytes").unwrap();
    assert_eq!(cpu.lock().samples_learned(), 100);
    assert_eq!(memory.lock().samples_learned(), 1);
}

#[test]
fn test_log_buffer_respects_capacity() {
    let mut config = test_config();
    config.log_buffer_capacity = 100;
    let (engine, _worker, _received) = engine_with_channel(config);

    for i in 0..250 {
        engine.ingest_log(LogRecord::new(i, "INFO", format!("line {}", i)));
    }

    let snapshot = engine.log_buffer().snapshot();
    assert_eq!(snapshot.len(), 100);
    assert_eq!(snapshot[0].message, "line 150");
    assert_eq!(snapshot[99].message, "line 249");
}

#[tokio::test]
async fn test_ingest_loop_processes_events_in_order() {
    let (engine, _worker, _received) = engine_with_channel(test_config());
    let engine = Arc::new(engine);
    let (ingest, events_tx) = IngestLoop::new(Arc::clone(&engine), 64);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    events_tx
        .send(TelemetryEvent::Log(LogRecord::new(1, "ERROR", "first")))
        .await
        .unwrap();
    for i in 0..10 {
        events_tx
            .send(TelemetryEvent::Metric(MetricSample::new("cpu_usage_percent", 40.0, i)))
            .await
            .unwrap();
    }
    events_tx
        .send(TelemetryEvent::Log(LogRecord::new(2, "WARN", "second")))
        .await
        .unwrap();
    drop(events_tx);

    let stats = ingest.run(shutdown_rx).await;

    assert_eq!(stats.metrics, 10);
    assert_eq!(stats.logs, 2);
    assert_eq!(stats.alerts, 0);

    let messages: Vec<String> = engine
        .log_buffer()
        .snapshot()
        .into_iter()
        .map(|record| record.message)
        .collect();
    assert_eq!(messages, vec!["first", "second"]);
}

#[tokio::test]
async fn test_ingest_loop_stops_on_shutdown() {
    let (engine, _worker, _received) = engine_with_channel(test_config());
    let (ingest, _events_tx) = IngestLoop::new(Arc::new(engine), 8);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(ingest.run(shutdown_rx));
    shutdown_tx.send(()).unwrap();

    let stats = handle.await.unwrap();
    assert_eq!(stats, IngestStats::default());
}

#[tokio::test]
async fn test_ingest_loop_reports_scorer_health() {
    let (engine, _worker, _received) = engine_with_channel(test_config());
    let health = HealthRegistry::new();
    health.set_ready(true).await;

    let (ingest, events_tx) = IngestLoop::new(Arc::new(engine), 8);
    let ingest = ingest.with_health(health.clone());

    events_tx
        .send(TelemetryEvent::Metric(MetricSample::new("cpu_usage_percent", 40.0, 1)))
        .await
        .unwrap();
    drop(events_tx);

    let stats = ingest.drain().await;
    assert_eq!(stats.metrics, 1);

    let report = health.health().await;
    let scorer = &report.components[components::SCORER];
    assert_eq!(scorer.status, ComponentStatus::Unhealthy);
    assert_eq!(scorer.message.as_deref(), Some("ingest loop stopped"));
    assert!(!health.readiness().await.ready);
}

#[tokio::test]
async fn test_ordered_shutdown_delivers_late_alerts() {
    let (engine, worker, mut received) = engine_with_channel(test_config());
    let window = engine.config().model.window_size;
    let (ingest, events_tx) = IngestLoop::new(Arc::new(engine), 16);

    let (publish_shutdown_tx, publish_shutdown_rx) = broadcast::channel(1);
    let worker_handle = tokio::spawn(worker.run(publish_shutdown_rx));
    let ingest_handle = tokio::spawn(ingest.drain());

    for i in 0..(window * 2) {
        events_tx
            .send(TelemetryEvent::Metric(MetricSample::new(
                "nginx_request_time_ms",
                120.0,
                i as i64,
            )))
            .await
            .unwrap();
    }
    // Last accepted event raises an alert just before producers go away
    events_tx
        .send(TelemetryEvent::Metric(MetricSample::new(
            "nginx_request_time_ms",
            1e9,
            1_000,
        )))
        .await
        .unwrap();
    drop(events_tx);

    let stats = ingest_handle.await.unwrap();
    assert_eq!(stats.metrics, window * 2 + 1);
    assert_eq!(stats.alerts, 1);

    publish_shutdown_tx.send(()).unwrap();
    worker_handle.await.unwrap();

    let delivered = received.recv().await.unwrap();
    assert_eq!(delivered.title, "Enable Micro-Caching");
}
