//! Collection engine.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`EntityFetcher`] | One metered, time-bounded poll per entity |
//! | [`FetchOutcome`] | Classification of a poll |
//! | [`CycleTimer`] | Recurring wait with a period that follows the entity count |
//! | [`Collector`] | Reload, plan, gate, fetch and publish, once per tick |
//!
//! The collector runs on one task and owns all mutable collection state. It
//! shares only the quota limiter (behind the fetcher), the gauge registry and
//! a [`StatusHandle`] with the rest of the process.

pub mod cycle;
pub mod fetcher;
pub mod outcome;
pub mod timer;

pub use cycle::{
    Collector, CollectorConfig, CollectorStatus, CycleReport, CycleStatus, StatusHandle,
};
pub use fetcher::{EntityFetcher, StatusFetcher};
pub use outcome::FetchOutcome;
pub use timer::CycleTimer;
