use crate::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Smallest sleep between refill checks; keeps the wait loop from spinning
/// on sub-millisecond remainders.
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub capacity: u32,
    pub refill_interval_ms: u64,
    pub tokens: f64,
    /// Estimated wait time until a token is available (ms), if currently empty.
    pub estimated_wait_ms: Option<u64>,
}

/// Remote quota expressed as a token bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaBudget {
    /// Maximum burst size (tokens).
    pub capacity: u32,
    /// One token is added back per interval.
    pub refill_interval: Duration,
}

impl QuotaBudget {
    /// BattleMetrics public limits: 15 requests burst, 60 requests/minute sustained.
    pub fn new() -> Self {
        Self {
            capacity: 15,
            refill_interval: Duration::from_secs(1),
        }
    }

    /// Set the burst capacity (at least 1).
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Set the refill interval (at least 1ms).
    pub fn with_refill_interval(mut self, interval: Duration) -> Self {
        self.refill_interval = interval.max(MIN_WAIT);
        self
    }

    fn tokens_per_sec(&self) -> f64 {
        1.0 / self.refill_interval.as_secs_f64()
    }
}

impl Default for QuotaBudget {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
}

/// Token-bucket gate in front of every outbound status poll.
///
/// - Starts full
/// - Refill is computed lazily on each call, there is no background timer
/// - `acquire` blocks until a token is available; only cancellation fails it
pub struct QuotaLimiter {
    budget: QuotaBudget,
    state: Mutex<State>,
}

impl QuotaLimiter {
    pub fn new(budget: QuotaBudget) -> Self {
        let state = Mutex::new(State {
            tokens: budget.capacity as f64,
            last: Instant::now(),
        });
        Self { budget, state }
    }

    pub fn budget(&self) -> &QuotaBudget {
        &self.budget
    }

    fn refill_locked(budget: &QuotaBudget, st: &mut State) {
        let now = Instant::now();
        let elapsed = now.duration_since(st.last).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * budget.tokens_per_sec()).min(budget.capacity as f64);
            st.last = now;
        }
    }

    /// Acquire one token, sleeping until one is available.
    ///
    /// Returns `Error::Cancelled` if `cancel` fires while waiting; no token is
    /// consumed in that case.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let budget = &self.budget;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled("quota_limiter"));
            }

            let wait_duration = {
                let mut st = self.state.lock().await;
                Self::refill_locked(budget, &mut st);

                if st.tokens >= 1.0 {
                    st.tokens -= 1.0;
                    return Ok(());
                }

                let missing = 1.0 - st.tokens;
                Duration::from_secs_f64(missing / budget.tokens_per_sec()).max(MIN_WAIT)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::cancelled("quota_limiter")),
                _ = tokio::time::sleep(wait_duration) => {}
            }
        }
    }

    /// Try to acquire a token without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let mut st = self.state.lock().await;
        Self::refill_locked(&self.budget, &mut st);

        if st.tokens >= 1.0 {
            st.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub async fn snapshot(&self) -> QuotaSnapshot {
        let budget = &self.budget;
        let mut st = self.state.lock().await;
        Self::refill_locked(budget, &mut st);

        let estimated_wait_ms = if st.tokens < 1.0 {
            let missing = 1.0 - st.tokens;
            Some((missing / budget.tokens_per_sec() * 1000.0).ceil() as u64)
        } else {
            None
        };

        QuotaSnapshot {
            capacity: budget.capacity,
            refill_interval_ms: budget.refill_interval.as_millis() as u64,
            tokens: st.tokens,
            estimated_wait_ms,
        }
    }
}
