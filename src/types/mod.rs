//! # Types Module
//!
//! Data carried through one collection cycle.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TrackedEntity`] | A server to poll: stable short name + status URL |
//! | [`StatusResponse`] | Wire shape of the remote status document |
//! | [`ObservationFacts`] | Facts extracted from one successful poll |
//!
//! ## Example
//!
//! ```rust
//! use squad_metrics_exporter::types::{ObservationFacts, StatusResponse};
//!
//! let body = r#"{"data":{"attributes":{"name":"[EU] Bravo","players":42,
//!     "details":{"map":"Logar","gameMode":"AAS","squad_playTime":930,
//!     "squad_teamOne":"US","squad_teamTwo":"RU"}}}}"#;
//! let status: StatusResponse = serde_json::from_str(body).unwrap();
//! let facts = ObservationFacts::from(status);
//! assert_eq!(facts.player_count, 42);
//! assert_eq!(facts.current_map, "Logar");
//! ```

pub mod entity;
pub mod status;

pub use entity::TrackedEntity;
pub use status::{ObservationFacts, StatusResponse};
