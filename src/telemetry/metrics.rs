//! Prometheus metric families exported for every tracked server.

use crate::{Error, ErrorContext, Result};
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

pub const SHORT_NAME: &str = "server_short_name";

/// All exported families, registered into one registry.
///
/// Cloning is cheap: every vec is reference counted internally, so clones
/// write to the same series.
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    /// Players on the server (stable labels only)
    pub player_count: IntGaugeVec,
    /// Current round play time (stable labels only)
    pub play_time: IntGaugeVec,
    /// Static server information, value is always 1
    pub server_info: IntGaugeVec,
    /// Current map, value is always 1
    pub current_map: IntGaugeVec,
    /// Current game mode, value is always 1
    pub current_game_mode: IntGaugeVec,
    /// Current team pairing, value is always 1
    pub current_teams: IntGaugeVec,
    /// Failed polls per server
    pub scrape_errors: IntCounterVec,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create and register all families into `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let player_count = gauge_vec(
            &registry,
            "squad_player_count",
            "Number of players on the squad server",
            &[SHORT_NAME],
        )?;
        let play_time = gauge_vec(
            &registry,
            "squad_play_time_seconds",
            "Current round play time in seconds",
            &[SHORT_NAME],
        )?;
        let server_info = gauge_vec(
            &registry,
            "squad_server_info",
            "Static server information",
            &[SHORT_NAME, "server_full_name"],
        )?;
        let current_map = gauge_vec(
            &registry,
            "squad_current_map",
            "Current map being played (value is always 1)",
            &[SHORT_NAME, "map_name"],
        )?;
        let current_game_mode = gauge_vec(
            &registry,
            "squad_current_game_mode",
            "Current game mode (value is always 1)",
            &[SHORT_NAME, "game_mode"],
        )?;
        let current_teams = gauge_vec(
            &registry,
            "squad_current_teams",
            "Current team configuration (value is always 1)",
            &[SHORT_NAME, "team_one", "team_two"],
        )?;

        let scrape_errors = IntCounterVec::new(
            Opts::new(
                "squad_server_scrape_errors_total",
                "Total number of scrape errors",
            ),
            &["server_name"],
        )?;
        registry.register(Box::new(scrape_errors.clone()))?;

        Ok(Self {
            registry,
            player_count,
            play_time,
            server_info,
            current_map,
            current_game_mode,
            current_teams,
            scrape_errors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one failed poll for `server_name`.
    pub fn record_scrape_error(&self, server_name: &str) {
        match self.scrape_errors.get_metric_with_label_values(&[server_name]) {
            Ok(counter) => counter.inc(),
            Err(e) => tracing::warn!(server = server_name, "failed to record scrape error: {}", e),
        }
    }

    pub fn scrape_error_count(&self, server_name: &str) -> u64 {
        self.scrape_errors
            .get_metric_with_label_values(&[server_name])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            Error::runtime_with_context(
                "metrics output is not valid UTF-8",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("metrics_render"),
            )
        })
    }
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec> {
    let vec = IntGaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}
