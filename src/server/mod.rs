//! HTTP surface: metrics exposition, heartbeat and a service summary.
//!
//! Handlers only read shared state: the gauge registry and the collector's
//! status snapshot. Nothing here touches the server list or the network.

use crate::collector::{CollectorStatus, CycleReport, StatusHandle};
use crate::resilience::{BackoffSnapshot, QuotaLimiter, QuotaSnapshot};
use crate::telemetry::ExporterMetrics;
use crate::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
pub const SERVICE_NAME: &str = "Squad Server Metrics";

#[derive(Clone)]
pub struct AppState {
    metrics: ExporterMetrics,
    status: StatusHandle,
    limiter: Arc<QuotaLimiter>,
    /// Where the server list is read from, for the summary note.
    source: Arc<str>,
}

impl AppState {
    pub fn new(
        metrics: ExporterMetrics,
        status: StatusHandle,
        limiter: Arc<QuotaLimiter>,
        source: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            metrics,
            status,
            limiter,
            source: source.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub service: &'static str,
    pub version: &'static str,
    pub servers: usize,
    pub note: String,
    pub endpoints: Vec<&'static str>,
    pub collection: CollectionSummary,
}

#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    pub interval_secs: f64,
    pub quota: QuotaSnapshot,
    pub backoff: BackoffSnapshot,
    pub last_cycle: Option<CycleReport>,
}

impl ServiceSummary {
    fn from_status(status: &CollectorStatus, quota: QuotaSnapshot, source: &str) -> Self {
        Self {
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            servers: status.entity_count,
            note: format!("Servers are reloaded from {} before each collection", source),
            endpoints: vec!["/metrics", "/health"],
            collection: CollectionSummary {
                interval_secs: status.interval_secs,
                quota,
                backoff: status.backoff.clone(),
                last_cycle: status.last_cycle.clone(),
            },
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(summary_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], ".")
}

async fn summary_handler(State(state): State<AppState>) -> Json<ServiceSummary> {
    let quota = state.limiter.snapshot().await;
    let status = state.status.load();
    Json(ServiceSummary::from_status(&status, quota, &state.source))
}

/// Serve `router` on `listener` until `cancel` fires, then drain in-flight requests.
pub async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Starting server on http://{}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            info!("HTTP server received shutdown signal, stopping...");
        })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
