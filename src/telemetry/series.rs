//! Bookkeeping for label combinations that change over time.

use std::collections::HashMap;

/// Metric families whose label values vary per entity between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesFamily {
    Info,
    Map,
    GameMode,
    Teams,
}

impl SeriesFamily {
    pub const ALL: [SeriesFamily; 4] = [
        SeriesFamily::Info,
        SeriesFamily::Map,
        SeriesFamily::GameMode,
        SeriesFamily::Teams,
    ];
}

/// Label values of one series, excluding the entity name.
pub type LabelValues = Vec<String>;

/// The single live label combination per (entity, family).
///
/// `replace` is the only way in: it hands back the combination that has to be
/// retracted from the exposition before the new one is set.
#[derive(Debug, Default)]
pub struct ActiveSeries {
    active: HashMap<String, HashMap<SeriesFamily, LabelValues>>,
}

impl ActiveSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `labels` the active combination; returns the previous one if it differs.
    pub fn replace(
        &mut self,
        entity: &str,
        family: SeriesFamily,
        labels: LabelValues,
    ) -> Option<LabelValues> {
        let families = self.active.entry(entity.to_string()).or_default();
        if families.get(&family) == Some(&labels) {
            return None;
        }
        families.insert(family, labels)
    }

    pub fn active(&self, entity: &str, family: SeriesFamily) -> Option<&LabelValues> {
        self.active.get(entity).and_then(|f| f.get(&family))
    }

    /// Forget an entity entirely; returns every combination it had.
    pub fn remove_entity(&mut self, entity: &str) -> Vec<(SeriesFamily, LabelValues)> {
        self.active
            .remove(entity)
            .map(|families| families.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
