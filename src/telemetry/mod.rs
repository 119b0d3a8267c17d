//! Exported metric state.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ExporterMetrics`] | Prometheus families and their registry |
//! | [`ActiveSeries`] | The live label combination per server and family |
//! | [`MetricPublisher`] | Applies poll results; retracts stale combinations |
//!
//! The HTTP layer only ever reads the registry; the collection loop owns the
//! publisher and is the only writer.

pub mod metrics;
pub mod publisher;
pub mod series;

pub use metrics::ExporterMetrics;
pub use publisher::MetricPublisher;
pub use series::{ActiveSeries, SeriesFamily};
