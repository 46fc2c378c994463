//! Multi-source configuration resolution.
//!
//! The same implementation may be configured by several sources. The
//! [`ConfigurationRegistry`] keeps every candidate and answers which one
//! applies: the highest-precedence source wins, and within one source the
//! first candidate added wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::agent::AgentConfiguration;
use super::loader::{ConfigurationDocument, ConfigurationLoader};
use super::source::Source;

/// Capacity of the duration history when nothing configures it.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 10;

/// Largest history capacity a configuration document may request.
pub const HISTORY_SIZE_LIMIT: usize = 10_000;

/// Process-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Number of recent execution durations kept per agent.
    pub max_history_size: Option<usize>,
}

impl GlobalConfig {
    /// Configured history capacity, or the default. Never above
    /// [`HISTORY_SIZE_LIMIT`].
    pub fn history_size(&self) -> usize {
        self.max_history_size
            .unwrap_or(DEFAULT_MAX_HISTORY_SIZE)
            .min(HISTORY_SIZE_LIMIT)
    }
}

/// Index of configuration candidates by source and by implementation.
#[derive(Debug, Default)]
pub struct ConfigurationRegistry {
    by_source: BTreeMap<Source, Vec<AgentConfiguration>>,
    by_implementation: BTreeMap<String, Vec<AgentConfiguration>>,
    global: GlobalConfig,
    global_source: Option<Source>,
}

impl ConfigurationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a configuration candidate.
    pub fn add(&mut self, config: AgentConfiguration) {
        self.by_source
            .entry(config.source())
            .or_default()
            .push(config.clone());
        self.by_implementation
            .entry(config.implementation().to_string())
            .or_default()
            .push(config);
    }

    /// The candidate that applies to `implementation`, if any.
    pub fn highest_precedence(&self, implementation: &str) -> Option<&AgentConfiguration> {
        self.by_implementation
            .get(implementation)?
            .iter()
            .reduce(|best, candidate| {
                if candidate.source() > best.source() {
                    candidate
                } else {
                    best
                }
            })
    }

    /// Every candidate recorded for `source`, in insertion order.
    pub fn by_source(&self, source: Source) -> &[AgentConfiguration] {
        self.by_source
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every candidate recorded for `implementation`, in insertion order.
    pub fn candidates(&self, implementation: &str) -> &[AgentConfiguration] {
        self.by_implementation
            .get(implementation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Known implementation identifiers, sorted.
    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.by_implementation.keys().map(String::as_str)
    }

    /// Total number of candidates.
    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merged global settings.
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Pull every file-backed source from `loader`.
    ///
    /// Returns the number of candidates added.
    pub fn load(&mut self, loader: &dyn ConfigurationLoader) -> usize {
        let mut added = 0;
        for source in Source::FILES {
            if let Some(document) = loader.load(source) {
                added += self.load_document(source, &document);
            }
        }
        added
    }

    /// Add the contents of one document attributed to `source`.
    ///
    /// Entries that fail to build are logged and skipped. Returns the number
    /// of candidates added.
    pub fn load_document(&mut self, source: Source, document: &ConfigurationDocument) -> usize {
        if let Some(size) = document.global.max_history_size
            && self.global_source.is_none_or(|current| source >= current)
        {
            if size > HISTORY_SIZE_LIMIT {
                tracing::warn!(
                    source = %source,
                    requested = size,
                    limit = HISTORY_SIZE_LIMIT,
                    "Clamping max_history_size"
                );
            }
            self.global.max_history_size = Some(size.min(HISTORY_SIZE_LIMIT));
            self.global_source = Some(source);
        }

        let mut added = 0;
        for entry in &document.agents {
            match entry.agent.build_with_source(source) {
                Ok(config) => {
                    self.add(config);
                    added += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        implementation = entry.agent.implementation_id().unwrap_or("<none>"),
                        error = %e,
                        "Skipping agent configuration"
                    );
                }
            }
        }

        tracing::debug!(source = %source, added, "Loaded configuration document");
        added
    }
}
