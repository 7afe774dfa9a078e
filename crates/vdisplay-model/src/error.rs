//! Error types for model loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading profiles, configs or scenarios.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("duplicate profile '{0}'")]
    DuplicateProfile(String),

    #[error("duplicate display port '{0}'")]
    DuplicatePort(String),

    #[error("invalid profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("invalid scenario '{name}': {reason}")]
    InvalidScenario { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

pub(crate) fn read_file(path: &std::path::Path) -> ModelResult<String> {
    std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}
