//! The collection loop: reload, plan, gate, fetch, publish, wait.

use crate::collector::fetcher::StatusFetcher;
use crate::collector::outcome::FetchOutcome;
use crate::collector::timer::CycleTimer;
use crate::registry::EntitySource;
use crate::resilience::{
    BackoffConfig, BackoffGovernor, BackoffSnapshot, IntervalPlanner, QuotaBudget,
};
use crate::telemetry::MetricPublisher;
use crate::Result;
use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Read side of the collector's status, shared with the HTTP layer.
pub type StatusHandle = Arc<ArcSwap<CollectorStatus>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    /// Stopped at the first quota rejection.
    AbortedOnQuota,
    /// Cooling after a recent quota rejection; nothing was fetched.
    SkippedCooling,
    /// The server list could not be reloaded; nothing was fetched.
    ReloadFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub entity_count: usize,
    pub attempted: usize,
    pub successes: usize,
    pub failures: usize,
    pub quota_hits: usize,
    pub duration_ms: u64,
    pub finished_at_unix: u64,
}

impl CycleReport {
    fn new(status: CycleStatus, entity_count: usize) -> Self {
        Self {
            status,
            entity_count,
            attempted: 0,
            successes: 0,
            failures: 0,
            quota_hits: 0,
            duration_ms: 0,
            finished_at_unix: 0,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.finished_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self
    }
}

/// What the root endpoint reports about collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub entity_count: usize,
    pub interval_secs: f64,
    pub backoff: BackoffSnapshot,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectorConfig {
    pub budget: QuotaBudget,
    pub backoff: BackoffConfig,
    /// Entity count known at startup; sizes the timer before the first cycle.
    pub initial_entity_count: usize,
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: QuotaBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_initial_entity_count(mut self, count: usize) -> Self {
        self.initial_entity_count = count;
        self
    }
}

/// Drives collection cycles. Sole owner of the governor, the publisher and
/// the cycle timer; runs on a single task.
pub struct Collector {
    source: Arc<dyn EntitySource>,
    fetcher: Arc<dyn StatusFetcher>,
    publisher: MetricPublisher,
    governor: BackoffGovernor,
    planner: IntervalPlanner,
    timer: CycleTimer,
    last_entity_count: Option<usize>,
    status: StatusHandle,
}

impl Collector {
    /// Must be called from within a tokio runtime.
    pub fn new(
        source: Arc<dyn EntitySource>,
        fetcher: Arc<dyn StatusFetcher>,
        publisher: MetricPublisher,
        config: CollectorConfig,
    ) -> Self {
        let planner = IntervalPlanner::new(config.budget);
        let timer = CycleTimer::new(planner.plan(config.initial_entity_count));
        let governor = BackoffGovernor::new(config.backoff);
        let status = Arc::new(ArcSwap::from_pointee(CollectorStatus {
            entity_count: config.initial_entity_count,
            interval_secs: timer.period().as_secs_f64(),
            backoff: governor.snapshot(),
            last_cycle: None,
        }));

        Self {
            source,
            fetcher,
            publisher,
            governor,
            planner,
            timer,
            last_entity_count: None,
            status,
        }
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn period(&self) -> Duration {
        self.timer.period()
    }

    pub fn governor(&self) -> &BackoffGovernor {
        &self.governor
    }

    pub fn publisher(&self) -> &MetricPublisher {
        &self.publisher
    }

    /// Run cycles until `cancel` fires. The first cycle starts immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            source = %self.source.describe(),
            period_secs = self.timer.period().as_secs_f64(),
            "collector started"
        );

        loop {
            match self.run_cycle(&cancel).await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => error!("collection cycle failed: {}", e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.timer.tick() => {}
            }
        }

        info!("collector stopped");
    }

    /// One complete cycle. Per-entity failures end up in the report; only
    /// cancellation is returned as an error.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
        let started = Instant::now();

        let entities = match self.source.load().await {
            Ok(entities) => entities,
            Err(e) => {
                error!(
                    source = %self.source.describe(),
                    "failed to reload server list, keeping previous metrics: {}", e
                );
                let report = CycleReport::new(
                    CycleStatus::ReloadFailed,
                    self.last_entity_count.unwrap_or(0),
                )
                .finish(started);
                self.publish_status(&report);
                return Ok(report);
            }
        };

        let count = entities.len();
        self.apply_entity_count(count);

        let listed: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let pruned = self.publisher.retain_entities(&listed);
        if pruned > 0 {
            info!(pruned, "dropped series of servers no longer listed");
        }

        let now = Instant::now();
        if self.governor.should_skip_cycle_at(now) {
            let backoff = self.governor.snapshot_at(now);
            warn!(
                consecutive_quota_hits = backoff.consecutive_quota_hits,
                cooling_remaining_ms = backoff.cooling_remaining_ms.unwrap_or(0),
                "⏸️  Skipping collection cycle, cooling down after rate limit"
            );
            let report = CycleReport::new(CycleStatus::SkippedCooling, count).finish(started);
            self.publish_status(&report);
            return Ok(report);
        }

        info!("Starting metrics collection for {} servers", count);
        let mut report = CycleReport::new(CycleStatus::Completed, count);

        for entity in &entities {
            let outcome = self.fetcher.fetch(entity, cancel).await?;
            report.attempted += 1;

            match outcome {
                FetchOutcome::Success(facts) => {
                    self.governor.on_success();
                    match self.publisher.publish(&entity.name, &facts) {
                        Ok(()) => {
                            report.successes += 1;
                            debug!(
                                server = %entity.name,
                                players = facts.player_count,
                                map = %facts.current_map,
                                "published"
                            );
                        }
                        Err(e) => {
                            report.failures += 1;
                            self.publisher.metrics().record_scrape_error(&entity.name);
                            error!(server = %entity.name, "failed to publish metrics: {}", e);
                        }
                    }
                }
                FetchOutcome::QuotaExceeded { .. } => {
                    report.quota_hits += 1;
                    self.governor.on_quota_exceeded();
                    if self.governor.config().abort_cycle_on_quota {
                        warn!(
                            server = %entity.name,
                            skipped = count - report.attempted,
                            consecutive_quota_hits = self.governor.consecutive_quota_hits(),
                            "🛑 Rate limit hit, stopping collection cycle"
                        );
                        report.status = CycleStatus::AbortedOnQuota;
                        break;
                    }
                }
                other => {
                    report.failures += 1;
                    warn!(
                        server = %entity.name,
                        class = other.class(),
                        "Error collecting metrics: {}", other
                    );
                }
            }
        }

        let report = report.finish(started);
        info!(
            successes = report.successes,
            failures = report.failures,
            quota_hits = report.quota_hits,
            duration_ms = report.duration_ms,
            "✅ Metrics collection complete"
        );
        self.publish_status(&report);
        Ok(report)
    }

    fn apply_entity_count(&mut self, count: usize) {
        if self.last_entity_count == Some(count) {
            return;
        }

        let period = self.planner.plan(count);
        match self.last_entity_count {
            Some(previous) => info!(
                previous,
                current = count,
                period_secs = period.as_secs_f64(),
                "Server count changed, adjusting collection interval"
            ),
            None => info!(
                servers = count,
                period_secs = period.as_secs_f64(),
                "collection interval set"
            ),
        }
        self.timer.reset(period);
        self.last_entity_count = Some(count);
    }

    fn publish_status(&self, report: &CycleReport) {
        self.status.store(Arc::new(CollectorStatus {
            entity_count: report.entity_count,
            interval_secs: self.timer.period().as_secs_f64(),
            backoff: self.governor.snapshot(),
            last_cycle: Some(report.clone()),
        }));
    }
}
