//! Quota-aware pacing for outbound status polls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Token bucket shared by every outbound poll |
//! | [`planner`] | Collection-cycle period derived from the entity count |
//! | [`backoff`] | Cooling state entered after the remote rejects us for quota |
//!
//! ## Quota Limiter
//!
//! ```rust
//! use squad_metrics_exporter::resilience::rate_limiter::{QuotaBudget, QuotaLimiter};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let budget = QuotaBudget::new()
//!     .with_capacity(15)
//!     .with_refill_interval(Duration::from_secs(1));
//! let limiter = QuotaLimiter::new(budget);
//!
//! if limiter.try_acquire().await {
//!     // Poll the remote...
//! }
//! # }
//! ```
//!
//! ## Backoff Governor
//!
//! - **Normal**: cycles run as planned
//! - **Cooling**: a quota rejection happened less than the cooling window ago;
//!   whole cycles are skipped until it elapses or a poll succeeds
//!
//! ```rust
//! use squad_metrics_exporter::resilience::backoff::{BackoffConfig, BackoffGovernor};
//!
//! let mut governor = BackoffGovernor::new(BackoffConfig::default());
//! governor.on_quota_exceeded();
//! assert!(governor.should_skip_cycle());
//! governor.on_success();
//! assert!(!governor.should_skip_cycle());
//! ```

pub mod backoff;
pub mod planner;
pub mod rate_limiter;

pub use backoff::{BackoffConfig, BackoffGovernor, BackoffSnapshot, GovernorState};
pub use planner::IntervalPlanner;
pub use rate_limiter::{QuotaBudget, QuotaLimiter, QuotaSnapshot};
