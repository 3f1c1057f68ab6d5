//! HTTP API for telemetry ingestion, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::{LogRecord, MetricSample, TelemetryEvent},
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub events_tx: mpsc::Sender<TelemetryEvent>,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, events_tx: mpsc::Sender<TelemetryEvent>) -> Self {
        Self {
            health_registry,
            events_tx,
        }
    }
}

/// Ingestion response body
#[derive(Debug, Serialize)]
struct IngestResponse {
    accepted: usize,
    skipped: usize,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still scoring
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Forward metric samples to the ingest loop in request order
async fn ingest_metrics(
    State(state): State<Arc<AppState>>,
    Json(samples): Json<Vec<MetricSample>>,
) -> impl IntoResponse {
    let total = samples.len();
    let events = samples
        .into_iter()
        .filter(|sample| !sample.name.is_empty())
        .map(TelemetryEvent::Metric);

    forward(&state, events, total).await
}

/// Forward log records to the ingest loop in request order
async fn ingest_logs(
    State(state): State<Arc<AppState>>,
    Json(records): Json<Vec<LogRecord>>,
) -> impl IntoResponse {
    let total = records.len();
    forward(&state, records.into_iter().map(TelemetryEvent::Log), total).await
}

async fn forward(
    state: &AppState,
    events: impl Iterator<Item = TelemetryEvent>,
    total: usize,
) -> (StatusCode, Json<IngestResponse>) {
    let mut accepted = 0;

    for event in events {
        if state.events_tx.send(event).await.is_err() {
            warn!(accepted = accepted, "Ingest loop stopped, rejecting telemetry");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(IngestResponse {
                    accepted,
                    skipped: total - accepted,
                }),
            );
        }
        accepted += 1;
    }

    (
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted,
            skipped: total - accepted,
        }),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/metrics", post(ingest_metrics))
        .route("/v1/logs", post(ingest_logs))
        .with_state(state)
}

/// Start the API server, stopping on the shutdown signal
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
