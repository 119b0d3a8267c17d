//! Server list: where the set of tracked entities comes from.
//!
//! The list is re-read at the top of every cycle so edits to the file are
//! picked up without a restart. A load failure at startup is fatal; during a
//! run it only skips that cycle.

use crate::types::TrackedEntity;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Server list errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Server list '{path}' does not exist{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    NotFound { path: String, hint: Option<String> },

    #[error("Failed to load server list from {path}: {reason}{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    LoadError {
        path: String,
        reason: String,
        hint: Option<String>,
    },

    #[error("Failed to decode server list from {path}: {reason}")]
    DecodeError { path: String, reason: String },

    #[error("Invalid server entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("Duplicate server name '{name}' (entries must have unique names)")]
    DuplicateName { name: String },
}

impl RegistryError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            RegistryError::NotFound { ref mut hint, .. } => *hint = hint_val,
            RegistryError::LoadError { ref mut hint, .. } => *hint = hint_val,
            _ => (),
        }
        self
    }
}

/// Anything that can produce the current list of entities.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<TrackedEntity>, RegistryError>;
}

/// Server list stored in a JSON (or YAML) file of `{"Name", "Url"}` records.
#[derive(Debug, Clone)]
pub struct FileEntitySource {
    path: PathBuf,
}

impl FileEntitySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}

#[async_trait]
impl EntitySource for FileEntitySource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Vec<TrackedEntity>, RegistryError> {
        let path = self.path.display().to_string();

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::NotFound { path, hint: None }
                    .with_hint("create it with a JSON array of {\"Name\", \"Url\"} objects"));
            }
            Err(e) => {
                return Err(RegistryError::LoadError {
                    path,
                    reason: e.to_string(),
                    hint: None,
                })
            }
        };

        if metadata.is_dir() {
            return Err(RegistryError::LoadError {
                path,
                reason: "path is a directory, not a file".to_string(),
                hint: None,
            }
            .with_hint("remove the directory and create a proper JSON file"));
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| RegistryError::LoadError {
                path: path.clone(),
                reason: e.to_string(),
                hint: None,
            })?;

        let entities = if self.is_yaml() {
            serde_yaml::from_str::<Vec<TrackedEntity>>(&raw).map_err(|e| {
                RegistryError::DecodeError {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?
        } else {
            serde_json::from_str::<Vec<TrackedEntity>>(&raw).map_err(|e| {
                RegistryError::DecodeError {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?
        };

        validate_entities(&entities)?;
        Ok(entities)
    }
}

/// Names must be non-empty and unique, URLs must be absolute http(s).
pub fn validate_entities(entities: &[TrackedEntity]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();
    for (index, entity) in entities.iter().enumerate() {
        if entity.name.trim().is_empty() {
            return Err(RegistryError::InvalidEntry {
                index,
                reason: "empty Name".to_string(),
            });
        }

        let url = url::Url::parse(&entity.poll_url).map_err(|e| RegistryError::InvalidEntry {
            index,
            reason: format!("invalid Url '{}': {}", entity.poll_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::InvalidEntry {
                index,
                reason: format!("unsupported Url scheme '{}'", url.scheme()),
            });
        }

        if !seen.insert(entity.name.as_str()) {
            return Err(RegistryError::DuplicateName {
                name: entity.name.clone(),
            });
        }
    }
    Ok(())
}
