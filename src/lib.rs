//! # squad-metrics-exporter
//!
//! Rate-limit aware Prometheus exporter for Squad game-server status endpoints.
//!
//! ## Overview
//!
//! A single background task polls every listed server's status endpoint once
//! per cycle and republishes the facts it finds (player count, round time,
//! map, game mode, teams) as gauges. The remote API enforces a request quota,
//! so the interesting part is the collection engine: it decides when to poll,
//! how fast it may poll, how it backs off after being rejected, and how it
//! keeps label-bearing series consistent when a server changes map or mode.
//!
//! ## Key Features
//!
//! - **Quota Limiter**: token bucket in front of every outbound poll
//! - **Interval Planner**: cycle period derived from the number of servers
//! - **Backoff Governor**: whole cycles are skipped while cooling after a 429
//! - **Metric Publisher**: at most one live map / mode / teams series per server
//! - **Hot reload**: the server list is re-read at the top of every cycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use squad_metrics_exporter::collector::{Collector, EntityFetcher};
//! use squad_metrics_exporter::registry::{EntitySource, FileEntitySource};
//! use squad_metrics_exporter::resilience::QuotaLimiter;
//! use squad_metrics_exporter::telemetry::{ExporterMetrics, MetricPublisher};
//! use squad_metrics_exporter::transport::HttpTransport;
//! use squad_metrics_exporter::ExporterConfig;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> squad_metrics_exporter::Result<()> {
//!     let config = ExporterConfig::from_env();
//!     let source = Arc::new(FileEntitySource::new(&config.servers_file));
//!     let servers = source.load().await?;
//!
//!     let metrics = ExporterMetrics::new()?;
//!     let limiter = Arc::new(QuotaLimiter::new(config.quota_budget()));
//!     let transport = HttpTransport::new(&config.transport())?;
//!     let fetcher = Arc::new(EntityFetcher::new(transport, limiter, metrics.clone()));
//!
//!     let collector = Collector::new(
//!         source,
//!         fetcher,
//!         MetricPublisher::new(metrics),
//!         config.collector(servers.len()),
//!     );
//!     collector.run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`collector`] | Fetcher, outcome classification and the cycle loop |
//! | [`resilience`] | Quota limiter, interval planner and backoff governor |
//! | [`telemetry`] | Prometheus families and the series publisher |
//! | [`registry`] | Server list loading and validation |
//! | [`transport`] | Shared HTTP client |
//! | [`types`] | Tracked entities and the remote status document |
//! | [`server`] | `/metrics`, `/health` and `/` |
//! | [`config`] | Environment configuration |

pub mod collector;
pub mod config;
pub mod registry;
pub mod resilience;
pub mod server;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use collector::{Collector, CollectorStatus, EntityFetcher, FetchOutcome};
pub use config::ExporterConfig;
pub use registry::{EntitySource, FileEntitySource};
pub use telemetry::{ExporterMetrics, MetricPublisher};
pub use types::{ObservationFacts, TrackedEntity};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
