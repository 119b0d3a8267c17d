//! Entities read from the server list.

use serde::{Deserialize, Serialize};

/// One remote server to poll.
///
/// Rebuilt from the server list at the start of every cycle; two entities with
/// the same `name` in consecutive cycles feed the same metric series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Url", alias = "url")]
    pub poll_url: String,
}

impl TrackedEntity {
    pub fn new(name: impl Into<String>, poll_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            poll_url: poll_url.into(),
        }
    }
}
