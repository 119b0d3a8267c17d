//! Applies observation facts to the exported gauges.

use crate::telemetry::metrics::ExporterMetrics;
use crate::telemetry::series::{ActiveSeries, LabelValues, SeriesFamily};
use crate::types::ObservationFacts;
use crate::Result;
use prometheus::IntGaugeVec;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Sole writer of the exported gauge state.
pub struct MetricPublisher {
    metrics: ExporterMetrics,
    series: ActiveSeries,
}

impl MetricPublisher {
    pub fn new(metrics: ExporterMetrics) -> Self {
        Self {
            metrics,
            series: ActiveSeries::new(),
        }
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    pub fn active_series(&self) -> &ActiveSeries {
        &self.series
    }

    /// Publish one entity's facts.
    ///
    /// Stable gauges are overwritten in place. For info, map, mode and teams
    /// the previous label combination is retracted before the new one is set,
    /// so at most one combination per family is live for `entity`.
    pub fn publish(&mut self, entity: &str, facts: &ObservationFacts) -> Result<()> {
        self.metrics
            .player_count
            .get_metric_with_label_values(&[entity])?
            .set(clamp(facts.player_count));
        self.metrics
            .play_time
            .get_metric_with_label_values(&[entity])?
            .set(clamp(facts.round_elapsed_seconds));

        for family in SeriesFamily::ALL {
            let labels = family_labels(family, facts);
            if let Some(previous) = self.series.replace(entity, family, labels.clone()) {
                debug!(
                    server = entity,
                    family = ?family,
                    previous = ?previous,
                    current = ?labels,
                    "retracting stale series"
                );
                self.retract(entity, family, &previous);
            }
            let gauge = self.family_vec(family);
            let values = with_entity(entity, &labels);
            gauge.get_metric_with_label_values(&as_strs(&values))?.set(1);
        }
        Ok(())
    }

    /// Drop every series of entities not in `keep` (servers removed from the list).
    pub fn retain_entities(&mut self, keep: &HashSet<&str>) -> usize {
        let stale: Vec<String> = self
            .series
            .entities()
            .filter(|name| !keep.contains(name))
            .map(str::to_string)
            .collect();

        for entity in &stale {
            for (family, labels) in self.series.remove_entity(entity) {
                self.retract(entity, family, &labels);
            }
            let _ = self.metrics.player_count.remove_label_values(&[entity]);
            let _ = self.metrics.play_time.remove_label_values(&[entity]);
        }
        stale.len()
    }

    fn retract(&self, entity: &str, family: SeriesFamily, labels: &LabelValues) {
        let values = with_entity(entity, labels);
        if let Err(e) = self.family_vec(family).remove_label_values(&as_strs(&values)) {
            warn!(server = entity, family = ?family, "failed to retract series: {}", e);
        }
    }

    fn family_vec(&self, family: SeriesFamily) -> &IntGaugeVec {
        match family {
            SeriesFamily::Info => &self.metrics.server_info,
            SeriesFamily::Map => &self.metrics.current_map,
            SeriesFamily::GameMode => &self.metrics.current_game_mode,
            SeriesFamily::Teams => &self.metrics.current_teams,
        }
    }
}

fn family_labels(family: SeriesFamily, facts: &ObservationFacts) -> LabelValues {
    match family {
        SeriesFamily::Info => vec![facts.display_name.clone()],
        SeriesFamily::Map => vec![facts.current_map.clone()],
        SeriesFamily::GameMode => vec![facts.current_mode.clone()],
        SeriesFamily::Teams => vec![facts.team_one.clone(), facts.team_two.clone()],
    }
}

fn with_entity(entity: &str, labels: &LabelValues) -> Vec<String> {
    let mut values = Vec::with_capacity(labels.len() + 1);
    values.push(entity.to_string());
    values.extend(labels.iter().cloned());
    values
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
