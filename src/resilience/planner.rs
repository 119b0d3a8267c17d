use crate::resilience::rate_limiter::QuotaBudget;
use std::time::Duration;

/// Sizes the collection cycle so that the next cycle never starts before the
/// quota bucket has fully replenished from the previous one.
#[derive(Debug, Clone)]
pub struct IntervalPlanner {
    budget: QuotaBudget,
    /// Used when the entity list is empty.
    pub fallback_period: Duration,
    /// Added when every entity fits in a single burst.
    pub single_burst_margin: Duration,
    /// Added when entities have to be drained over several bursts.
    pub multi_burst_margin: Duration,
}

impl IntervalPlanner {
    pub fn new(budget: QuotaBudget) -> Self {
        Self {
            budget,
            fallback_period: Duration::from_secs(60),
            single_burst_margin: Duration::from_secs(2),
            multi_burst_margin: Duration::from_secs(5),
        }
    }

    pub fn with_fallback_period(mut self, period: Duration) -> Self {
        self.fallback_period = period;
        self
    }

    /// Cycle period for `entity_count` entities.
    pub fn plan(&self, entity_count: usize) -> Duration {
        if entity_count == 0 {
            return self.fallback_period;
        }

        let capacity = self.budget.capacity.max(1) as usize;
        let refill = self.budget.refill_interval;

        if entity_count <= capacity {
            // One refill per entity puts the bucket back where it started
            return refill.saturating_mul(entity_count as u32) + self.single_burst_margin;
        }

        let bursts = entity_count.div_ceil(capacity);
        let tokens = bursts.saturating_mul(capacity).min(u32::MAX as usize) as u32;
        refill.saturating_mul(tokens) + self.multi_burst_margin
    }
}

impl Default for IntervalPlanner {
    fn default() -> Self {
        Self::new(QuotaBudget::default())
    }
}
