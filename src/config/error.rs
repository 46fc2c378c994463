//! Errors raised while building or loading agent configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::schedule::ScheduleError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No parser is available for this source.
    #[error("unsupported configuration source: {0}")]
    UnsupportedSource(String),

    /// A required field is absent or blank.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Two registrations claimed the same implementation identifier.
    #[error("implementation '{0}' is already registered")]
    DuplicateImplementation(String),

    /// Schedule text does not parse for its kind.
    #[error("invalid schedule for '{name}': {source}")]
    Schedule {
        name: String,
        #[source]
        source: ScheduleError,
    },
}
