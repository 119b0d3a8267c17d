//! Remote status document (BattleMetrics server resource, trimmed to what we export).

use serde::{Deserialize, Deserializer, Serialize};

/// `{"data": {"attributes": {...}}}`.
///
/// `data` and `attributes` are structural and must be present; leaf fields
/// and `details` default when the remote omits them or sends `null` (empty
/// servers and servers between rounds do both).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub data: StatusData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub attributes: StatusAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusAttributes {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: StatusDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub map: String,
    #[serde(default, rename = "gameMode", deserialize_with = "null_as_default")]
    pub game_mode: String,
    #[serde(default, rename = "squad_playTime", deserialize_with = "null_as_default")]
    pub play_time: u64,
    #[serde(default, rename = "squad_teamOne", deserialize_with = "null_as_default")]
    pub team_one: String,
    #[serde(default, rename = "squad_teamTwo", deserialize_with = "null_as_default")]
    pub team_two: String,
}

/// Missing keys and explicit `null` both decode as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Facts from one successful poll, handed straight to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationFacts {
    pub display_name: String,
    pub player_count: u64,
    pub current_map: String,
    pub current_mode: String,
    pub round_elapsed_seconds: u64,
    pub team_one: String,
    pub team_two: String,
}

impl From<StatusResponse> for ObservationFacts {
    fn from(resp: StatusResponse) -> Self {
        let attrs = resp.data.attributes;
        Self {
            display_name: attrs.name,
            player_count: attrs.players,
            current_map: attrs.details.map,
            current_mode: attrs.details.game_mode,
            round_elapsed_seconds: attrs.details.play_time,
            team_one: attrs.details.team_one,
            team_two: attrs.details.team_two,
        }
    }
}
