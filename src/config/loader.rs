//! File-backed configuration sources.
//!
//! A configuration directory may hold `agents.json` and `agents.yaml`
//! documents of the form:
//!
//! ```yaml
//! global:
//!   max_history_size: 20
//! agents:
//!   - implementation: reports::nightly
//!     name: nightly-report
//!     kind: cron
//!     schedule: "0 2 * * *"
//!     statistics: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::agent::AgentConfigurationBuilder;
use super::error::ConfigError;
use super::registry::GlobalConfig;
use super::source::Source;
use crate::execution::CommandSpec;

/// Contents of one configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationDocument {
    /// Global settings.
    pub global: GlobalConfig,
    /// Agent definitions.
    pub agents: Vec<AgentEntry>,
}

/// One agent definition in a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentEntry {
    #[serde(flatten)]
    pub agent: AgentConfigurationBuilder,
    /// External program backing this agent, used by the `agentry` binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
}

/// Supplies configuration documents for file-backed sources.
///
/// Implementations never fail: a missing or unreadable document is reported
/// as `None` so that other sources still load.
pub trait ConfigurationLoader: Send + Sync {
    fn load(&self, source: Source) -> Option<ConfigurationDocument>;
}

/// Loads `agents.json` and `agents.yaml` from a directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    dir: PathBuf,
}

impl FileLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The configuration directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `source`, if it has one.
    pub fn path_for(&self, source: Source) -> Option<PathBuf> {
        source.file_name().map(|name| self.dir.join(name))
    }

    /// Load the document for `source`, surfacing every failure.
    ///
    /// Returns `Ok(None)` when the source has no file or the file is absent.
    pub fn try_load(&self, source: Source) -> Result<Option<ConfigurationDocument>, ConfigError> {
        let Some(path) = self.path_for(source) else {
            return Ok(None);
        };

        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;

        let document = match source {
            Source::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::Json { path, source: e })?,
            Source::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::Yaml { path, source: e })?,
            other => return Err(ConfigError::UnsupportedSource(other.to_string())),
        };

        Ok(Some(document))
    }
}

impl ConfigurationLoader for FileLoader {
    fn load(&self, source: Source) -> Option<ConfigurationDocument> {
        match self.try_load(source) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Ignoring configuration source");
                None
            }
        }
    }
}
