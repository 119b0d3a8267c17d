//! Recurring cycle timer with a mutable period.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

pub struct CycleTimer {
    period: Duration,
    interval: Interval,
}

impl CycleTimer {
    /// First tick fires one `period` from now.
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        Self {
            period,
            interval: ticker(period),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Restart the timer with `period`; the next tick is one new period from now.
    pub fn reset(&mut self, period: Duration) {
        self.period = period.max(MIN_PERIOD);
        self.interval = ticker(self.period);
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    // A cycle longer than the period drops the missed ticks instead of
    // firing them back to back.
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
