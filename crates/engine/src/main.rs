//! RCA Engine - streaming anomaly detection and root-cause analysis
//!
//! Scores every incoming metric sample against a per-metric half-space-tree
//! model, correlates alerts with recent error logs and publishes
//! configuration recommendations.

use anyhow::Result;
use engine_lib::{
    engine::{AnomalyEngine, IngestLoop, DEFAULT_INGEST_CHANNEL_SIZE},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    sink::{HttpSink, LogSink, Publisher, RecommendationSink},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rca-engine");

    // Load and validate configuration
    let settings = config::EngineSettings::load()?;
    let engine_config = settings.engine_config()?;
    info!(server_name = %settings.server_name, "Engine configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCORER).await;
    health_registry.register(components::SINK).await;

    let logger = StructuredLogger::new(&settings.server_name);

    // Recommendation delivery
    let sink: Arc<dyn RecommendationSink> = match &settings.sink_url {
        Some(url) => {
            info!(url = %url, "Publishing recommendations to webhook");
            Arc::new(HttpSink::new(url.as_str(), settings.sink_timeout())?)
        }
        None => Arc::new(LogSink),
    };
    let (publisher, publish_worker) =
        Publisher::new(engine_config.publish_queue_capacity, sink, logger.clone());
    let publish_worker = publish_worker.with_health(health_registry.clone());

    let model = engine_config.model;
    let engine = Arc::new(
        AnomalyEngine::builder()
            .config(engine_config)
            .publisher(publisher)
            .logger(logger.clone())
            .build()?,
    );
    let (ingest_loop, events_tx) =
        IngestLoop::new(Arc::clone(&engine), DEFAULT_INGEST_CHANNEL_SIZE);
    let ingest_loop = ingest_loop.with_health(health_registry.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (publish_shutdown_tx, publish_shutdown_rx) = broadcast::channel::<()>(1);

    let publish_handle = tokio::spawn(publish_worker.run(publish_shutdown_rx));
    let ingest_handle = tokio::spawn(ingest_loop.drain());

    // Start ingestion, health and metrics server; it owns the only event sender
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), events_tx));
    let api_handle = tokio::spawn(api::serve(
        settings.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    logger.log_startup(ENGINE_VERSION, model.n_trees, model.height, model.window_size);
    health_registry.set_ready(true).await;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    // Stop accepting telemetry, finish what was accepted, then flush recommendations
    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task panicked"),
        Ok(Ok(())) => {}
    }
    let stats = ingest_handle.await?;
    let _ = publish_shutdown_tx.send(());
    publish_handle.await?;

    let published = engine.publisher().stats();
    info!(
        metrics = stats.metrics,
        logs = stats.logs,
        alerts = stats.alerts,
        recommendations_published = published.published,
        recommendations_dropped = published.dropped,
        "Shutdown complete"
    );

    Ok(())
}
