use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorState {
    Normal,
    Cooling,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackoffSnapshot {
    pub state: GovernorState,
    pub cooling_window_ms: u64,
    pub consecutive_quota_hits: u32,
    /// Remaining cooling time in ms, if currently cooling.
    pub cooling_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// How long a quota hit suppresses whole cycles.
    pub cooling_window: Duration,
    /// Stop the current cycle at the first quota hit instead of skipping
    /// only the rejected entity.
    pub abort_cycle_on_quota: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            cooling_window: Duration::from_secs(30),
            abort_cycle_on_quota: true,
        }
    }
}

impl BackoffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cooling_window(mut self, window: Duration) -> Self {
        self.cooling_window = window;
        self
    }

    pub fn with_abort_cycle_on_quota(mut self, abort: bool) -> Self {
        self.abort_cycle_on_quota = abort;
        self
    }
}

#[derive(Debug, Default)]
struct BackoffState {
    consecutive_quota_hits: u32,
    last_quota_hit: Option<Instant>,
}

/// Quota backoff governor.
///
/// - Counts consecutive quota rejections; other failure kinds are ignored
/// - Cooling while the last hit is younger than the cooling window
/// - Any fetch success resets the count and ends cooling immediately
///
/// Owned by the collection loop, so mutation goes through `&mut self`.
#[derive(Debug)]
pub struct BackoffGovernor {
    cfg: BackoffConfig,
    state: BackoffState,
}

impl BackoffGovernor {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self {
            cfg,
            state: BackoffState::default(),
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.cfg
    }

    pub fn consecutive_quota_hits(&self) -> u32 {
        self.state.consecutive_quota_hits
    }

    pub fn state_at(&self, now: Instant) -> GovernorState {
        match self.state.last_quota_hit {
            Some(hit)
                if self.state.consecutive_quota_hits > 0
                    && now.saturating_duration_since(hit) < self.cfg.cooling_window =>
            {
                GovernorState::Cooling
            }
            _ => GovernorState::Normal,
        }
    }

    pub fn state(&self) -> GovernorState {
        self.state_at(Instant::now())
    }

    /// Whether a cycle starting at `now` must skip all fetch work.
    pub fn should_skip_cycle_at(&self, now: Instant) -> bool {
        self.state_at(now) == GovernorState::Cooling
    }

    pub fn should_skip_cycle(&self) -> bool {
        self.should_skip_cycle_at(Instant::now())
    }

    pub fn on_quota_exceeded_at(&mut self, now: Instant) {
        self.state.consecutive_quota_hits = self.state.consecutive_quota_hits.saturating_add(1);
        self.state.last_quota_hit = Some(now);
    }

    pub fn on_quota_exceeded(&mut self) {
        self.on_quota_exceeded_at(Instant::now());
    }

    pub fn on_success(&mut self) {
        if self.state.consecutive_quota_hits > 0 {
            info!(
                previous_hits = self.state.consecutive_quota_hits,
                "quota hit counter reset after successful request"
            );
        }
        self.state.consecutive_quota_hits = 0;
        self.state.last_quota_hit = None;
    }

    pub fn snapshot_at(&self, now: Instant) -> BackoffSnapshot {
        let state = self.state_at(now);
        let cooling_remaining_ms = match (state, self.state.last_quota_hit) {
            (GovernorState::Cooling, Some(hit)) => {
                let until = hit + self.cfg.cooling_window;
                Some(until.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };
        BackoffSnapshot {
            state,
            cooling_window_ms: self.cfg.cooling_window.as_millis() as u64,
            consecutive_quota_hits: self.state.consecutive_quota_hits,
            cooling_remaining_ms,
        }
    }

    pub fn snapshot(&self) -> BackoffSnapshot {
        self.snapshot_at(Instant::now())
    }
}
