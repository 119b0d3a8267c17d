//! Squad server metrics exporter.
//!
//! Loads the server list, starts the collection loop and serves `/metrics`,
//! `/health` and `/` until interrupted. Configuration is read from the
//! environment, see [`squad_metrics_exporter::config`].

use anyhow::Context;
use squad_metrics_exporter::collector::{Collector, EntityFetcher};
use squad_metrics_exporter::registry::{EntitySource, FileEntitySource};
use squad_metrics_exporter::resilience::QuotaLimiter;
use squad_metrics_exporter::server::{self, AppState};
use squad_metrics_exporter::telemetry::{ExporterMetrics, MetricPublisher};
use squad_metrics_exporter::transport::HttpTransport;
use squad_metrics_exporter::ExporterConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "squad_metrics_exporter=info,squad_exporter=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let config = ExporterConfig::from_env();
    config.validate().context("invalid configuration")?;

    let source = Arc::new(FileEntitySource::new(&config.servers_file));
    let servers = match source.load().await {
        Ok(servers) => servers,
        Err(e) => {
            error!("FATAL: Cannot start without a valid server list: {}", e);
            return Err(e).context("failed to load server list");
        }
    };

    let budget = config.quota_budget();
    info!(
        burst = budget.capacity,
        refill_ms = budget.refill_interval.as_millis() as u64,
        "Rate limiter configured"
    );
    info!("Initial load: {} servers", servers.len());
    if servers.is_empty() {
        warn!("server list is empty, nothing will be polled until it is edited");
    }

    let metrics = ExporterMetrics::new().context("failed to register metrics")?;
    let limiter = Arc::new(QuotaLimiter::new(budget));
    let transport =
        HttpTransport::new(&config.transport()).context("failed to build HTTP client")?;
    let fetcher = Arc::new(EntityFetcher::new(transport, limiter.clone(), metrics.clone()));

    let collector = Collector::new(
        source.clone(),
        fetcher,
        MetricPublisher::new(metrics.clone()),
        config.collector(servers.len()),
    );
    info!(
        "Optimal collection interval: {:?} (based on {} servers)",
        collector.period(),
        servers.len()
    );
    let status = collector.status_handle();

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| {
            error!("FATAL: Cannot bind {}: {}", addr, e);
            e
        })
        .with_context(|| format!("failed to bind {}", addr))?;

    let cancel = CancellationToken::new();
    let collector_task = tokio::spawn(collector.run(cancel.clone()));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    let state = AppState::new(metrics, status, limiter, source.describe());
    let served = server::serve(listener, server::router(state), cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = collector_task.await {
        warn!("collector task ended abnormally: {}", e);
    }

    served.context("HTTP server failed")
}
