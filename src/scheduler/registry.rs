//! The agent registry.
//!
//! [`AgentRegistry`] is the top-level object: it discovers configuration
//! candidates, resolves them by precedence, instantiates one [`Agent`] per
//! implementation, and exposes name-based management operations.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::agent::Agent;
use super::catalog::{AgentScanner, TaskCatalog};
use super::types::{AgentError, AgentStatus, RegistryError};
use crate::config::{AgentConfiguration, ConfigurationLoader, ConfigurationRegistry};

#[derive(Default)]
struct AgentIndex {
    by_name: BTreeMap<String, Arc<Agent>>,
    /// Resolved configuration per instantiated implementation.
    by_implementation: BTreeMap<String, AgentConfiguration>,
}

/// Manages named agents.
pub struct AgentRegistry {
    catalog: Arc<TaskCatalog>,
    scanner: Arc<dyn AgentScanner>,
    configurations: RwLock<ConfigurationRegistry>,
    index: RwLock<AgentIndex>,
}

impl AgentRegistry {
    /// Create a registry that discovers agents from `catalog`.
    pub fn new(catalog: TaskCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            scanner: catalog.clone(),
            catalog,
            configurations: RwLock::new(ConfigurationRegistry::new()),
            index: RwLock::new(AgentIndex::default()),
        }
    }

    /// Replace the discovery collaborator. Tasks are still created by the
    /// catalog.
    pub fn with_scanner(mut self, scanner: Arc<dyn AgentScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Seed the configuration index, e.g. with candidates loaded from files.
    pub fn with_configurations(self, configurations: ConfigurationRegistry) -> Self {
        *write(&self.configurations) = configurations;
        self
    }

    /// Load every file-backed source from `loader`.
    ///
    /// Returns the number of configuration candidates added.
    pub fn load(&self, loader: &dyn ConfigurationLoader) -> usize {
        write(&self.configurations).load(loader)
    }

    /// Add one configuration candidate.
    pub fn add_configuration(&self, config: AgentConfiguration) {
        write(&self.configurations).add(config);
    }

    /// Read access to the configuration index.
    pub fn configurations(&self) -> RwLockReadGuard<'_, ConfigurationRegistry> {
        read(&self.configurations)
    }

    /// History capacity applied to new agents.
    pub fn history_size(&self) -> usize {
        read(&self.configurations).global().history_size()
    }

    /// Discover agents within `scope` and instantiate the new ones.
    ///
    /// Implementations that already have an agent are skipped. Failures are
    /// logged and skipped. Returns the number of agents added.
    pub fn discover(&self, scope: &str) -> usize {
        let candidates = self.scanner.scan(scope);
        if candidates.is_empty() {
            tracing::warn!(scope = %scope, "No agents found");
            return 0;
        }

        let resolved: Vec<AgentConfiguration> = {
            let mut configurations = write(&self.configurations);
            for candidate in &candidates {
                configurations.add(candidate.clone());
            }
            candidates
                .iter()
                .filter_map(|c| configurations.highest_precedence(c.implementation()).cloned())
                .collect()
        };

        let history_size = self.history_size();
        let mut added = 0;
        for config in resolved {
            if read(&self.index)
                .by_implementation
                .contains_key(config.implementation())
            {
                tracing::info!(
                    implementation = %config.implementation(),
                    "Agent already instantiated"
                );
                continue;
            }

            match self.instantiate(&config, history_size) {
                Ok(agent) => {
                    let mut index = write(&self.index);
                    if index.by_name.contains_key(config.name()) {
                        tracing::warn!(
                            agent = %config.name(),
                            implementation = %config.implementation(),
                            "Agent name already in use"
                        );
                        continue;
                    }
                    index
                        .by_implementation
                        .insert(config.implementation().to_string(), config.clone());
                    index.by_name.insert(config.name().to_string(), agent);
                    added += 1;
                    tracing::info!(
                        agent = %config.name(),
                        implementation = %config.implementation(),
                        source = %config.source(),
                        "Agent registered"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        implementation = %config.implementation(),
                        error = %e,
                        "Failed to instantiate agent"
                    );
                }
            }
        }

        added
    }

    fn instantiate(
        &self,
        config: &AgentConfiguration,
        history_size: usize,
    ) -> Result<Arc<Agent>, RegistryError> {
        let task = self.catalog.create(config.implementation()).ok_or_else(|| {
            RegistryError::NotFound(format!(
                "no task registered for implementation '{}'",
                config.implementation()
            ))
        })?;
        let agent = Agent::new(config.clone(), task, history_size)?;
        Ok(Arc::new(agent))
    }

    /// Look up an agent by exact name.
    pub fn find_by_name(&self, name: &str) -> Result<Arc<Agent>, RegistryError> {
        lookup(&read(&self.index), name)
    }

    pub async fn start(&self, name: &str) -> Result<(), RegistryError> {
        let agent = self.find_by_name(name)?;
        agent.start().await?;
        Ok(())
    }

    pub async fn stop(&self, name: &str) -> Result<(), RegistryError> {
        let agent = self.find_by_name(name)?;
        agent.stop().await?;
        Ok(())
    }

    /// Run the agent's task now, outside its schedule.
    pub async fn run_now(&self, name: &str) -> Result<(), RegistryError> {
        let agent = self.find_by_name(name)?;
        agent.run(true).await?;
        Ok(())
    }

    pub fn is_running(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.find_by_name(name)?.is_running())
    }

    pub fn is_started(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.find_by_name(name)?.is_started())
    }

    pub fn is_stopped(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.find_by_name(name)?.is_stopped())
    }

    pub fn status(&self, name: &str) -> Result<AgentStatus, RegistryError> {
        Ok(self.find_by_name(name)?.status())
    }

    /// Status of `name` as pretty-printed JSON.
    pub fn status_json(&self, name: &str) -> Result<String, RegistryError> {
        let status = self.status(name)?;
        Ok(serde_json::to_string_pretty(&status)?)
    }

    /// Remove an agent that is neither started nor running.
    ///
    /// The removed agent can no longer be started.
    pub fn remove(&self, name: &str) -> Result<Arc<Agent>, RegistryError> {
        let mut index = write(&self.index);
        let agent = lookup(&index, name)?;
        retire(&agent)?;

        index.by_name.remove(name);
        tracing::info!(agent = %name, "Agent removed");
        Ok(agent)
    }

    /// Replace an agent that is neither started nor running with a fresh one
    /// built from the same configuration.
    pub fn reset(&self, name: &str) -> Result<Arc<Agent>, RegistryError> {
        let history_size = self.history_size();
        let mut index = write(&self.index);
        let old = lookup(&index, name)?;
        let agent = self.instantiate(old.config(), history_size)?;
        retire(&old)?;

        index.by_name.insert(name.to_string(), agent.clone());
        tracing::info!(agent = %name, "Agent reset");
        Ok(agent)
    }

    /// Start every agent, returning the ones that failed.
    pub async fn start_all(&self) -> Vec<(String, AgentError)> {
        let mut failures = Vec::new();
        for agent in self.agents() {
            if let Err(e) = agent.start().await {
                tracing::warn!(agent = %agent.name(), error = %e, "Failed to start agent");
                failures.push((agent.name().to_string(), e));
            }
        }
        failures
    }

    /// Stop every started agent. Returns the number stopped.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for agent in self.agents() {
            if agent.is_started() && agent.stop().await.is_ok() {
                stopped += 1;
            }
        }
        stopped
    }

    /// Snapshot of all agents, ordered by name.
    pub fn agents(&self) -> Vec<Arc<Agent>> {
        read(&self.index).by_name.values().cloned().collect()
    }

    /// Registered agent names, sorted.
    pub fn names(&self) -> Vec<String> {
        read(&self.index).by_name.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.index).by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup(index: &AgentIndex, name: &str) -> Result<Arc<Agent>, RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::NotFound("<blank>".to_string()));
    }
    index
        .by_name
        .get(name)
        .cloned()
        .ok_or_else(|| RegistryError::NotFound(name.to_string()))
}

fn retire(agent: &Agent) -> Result<(), RegistryError> {
    agent.retire().map_err(|reason| RegistryError::IllegalState {
        name: agent.name().to_string(),
        reason: reason.to_string(),
    })
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
