//! Registration table of agent implementations.
//!
//! Applications register each task implementation under an identifier, along
//! with its discovered default configuration. The catalog then acts as the
//! [`AgentScanner`] that feeds discovery and as the factory that creates a
//! task for every agent instantiated from it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{AgentConfiguration, AgentConfigurationBuilder, ConfigError, Source};
use crate::core::task::Task;

/// Creates a fresh task for an agent.
pub type TaskFactory = Arc<dyn Fn() -> Arc<dyn Task> + Send + Sync>;

/// Source of configuration candidates for discovery.
pub trait AgentScanner: Send + Sync {
    /// Candidates whose implementation lies within `scope`.
    ///
    /// An empty scope matches everything.
    fn scan(&self, scope: &str) -> Vec<AgentConfiguration>;
}

struct CatalogEntry {
    config: AgentConfiguration,
    factory: TaskFactory,
}

/// Implementation identifier to task factory.
#[derive(Default)]
pub struct TaskCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation with its default configuration.
    ///
    /// The configuration is stamped [`Source::Discovered`]. Registering the
    /// same implementation twice is an error.
    pub fn register<F>(
        &mut self,
        builder: AgentConfigurationBuilder,
        factory: F,
    ) -> Result<&mut Self, ConfigError>
    where
        F: Fn() -> Arc<dyn Task> + Send + Sync + 'static,
    {
        let config = builder.build_with_source(Source::Discovered)?;
        let implementation = config.implementation().to_string();

        if self.entries.contains_key(&implementation) {
            return Err(ConfigError::DuplicateImplementation(implementation));
        }

        tracing::debug!(implementation = %implementation, "Registered agent implementation");
        self.entries.insert(
            implementation,
            CatalogEntry {
                config,
                factory: Arc::new(factory),
            },
        );
        Ok(self)
    }

    /// Register an implementation whose agents all share one task instance.
    pub fn register_task(
        &mut self,
        builder: AgentConfigurationBuilder,
        task: Arc<dyn Task>,
    ) -> Result<&mut Self, ConfigError> {
        self.register(builder, move || task.clone())
    }

    /// Create a task for `implementation`.
    pub fn create(&self, implementation: &str) -> Option<Arc<dyn Task>> {
        self.entries
            .get(implementation)
            .map(|entry| (entry.factory)())
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.entries.contains_key(implementation)
    }

    /// The discovered configuration of `implementation`.
    pub fn configuration(&self, implementation: &str) -> Option<&AgentConfiguration> {
        self.entries.get(implementation).map(|entry| &entry.config)
    }

    /// Registered identifiers, sorted.
    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `implementation` lies within `scope`.
///
/// Scopes are matched on path segments separated by `::` or `.`, so scope
/// `reports` covers `reports::nightly` and `reports.weekly` but not
/// `reportsx`.
pub fn in_scope(implementation: &str, scope: &str) -> bool {
    let scope = scope.trim();
    if scope.is_empty() || implementation == scope {
        return true;
    }
    implementation
        .strip_prefix(scope)
        .is_some_and(|rest| rest.starts_with("::") || rest.starts_with('.'))
}

impl AgentScanner for TaskCatalog {
    fn scan(&self, scope: &str) -> Vec<AgentConfiguration> {
        self.entries
            .iter()
            .filter(|(implementation, _)| in_scope(implementation, scope))
            .map(|(_, entry)| entry.config.clone())
            .collect()
    }
}
