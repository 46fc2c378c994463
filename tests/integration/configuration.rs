//! Configuration loading integration tests.
//!
//! Tests that load configuration directories from disk and verify how
//! sources combine before agents are instantiated.

use agentry::testing::CountingTask;
use agentry::{
    AgentRegistry, ConfigurationRegistry, FileLoader, ScheduleKind, Source, TaskCatalog,
};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{interval_agent, write_config};

const JSON_CONFIG: &str = r#"{
  "global": { "max_history_size": 5 },
  "agents": [
    { "implementation": "reports::nightly", "kind": "interval", "schedule": "2 hours" },
    { "implementation": "cleanup::temp", "kind": "interval", "schedule": "15 minutes", "modulate": true }
  ]
}"#;

const YAML_CONFIG: &str = r#"
global:
  max_history_size: 20
agents:
  - implementation: reports::nightly
    name: nightly-report
    kind: cron
    schedule: "0 2 * * *"
    statistics: true
  - implementation: broken::entry
    schedule: "5 minutes"
"#;

fn catalog() -> TaskCatalog {
    let mut catalog = TaskCatalog::new();
    catalog
        .register_task(
            interval_agent("reports::nightly", "1 hour"),
            Arc::new(CountingTask::new()),
        )
        .unwrap()
        .register_task(
            interval_agent("cleanup::temp", "1 hour"),
            Arc::new(CountingTask::new()),
        )
        .unwrap();
    catalog
}

#[test]
fn test_yaml_overrides_json() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "agents.json", JSON_CONFIG);
    write_config(dir.path(), "agents.yaml", YAML_CONFIG);

    let mut configurations = ConfigurationRegistry::new();
    // The entry without a kind is skipped.
    assert_eq!(configurations.load(&FileLoader::new(dir.path())), 3);

    let nightly = configurations.highest_precedence("reports::nightly").unwrap();
    assert_eq!(nightly.source(), Source::Yaml);
    assert_eq!(nightly.name(), "nightly-report");

    let cleanup = configurations.highest_precedence("cleanup::temp").unwrap();
    assert_eq!(cleanup.source(), Source::Json);
    assert!(cleanup.modulate());

    assert_eq!(configurations.global().history_size(), 20);
    assert!(configurations.highest_precedence("broken::entry").is_none());
}

#[test]
fn test_malformed_source_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "agents.json", "{ not json");
    write_config(dir.path(), "agents.yaml", YAML_CONFIG);

    let mut configurations = ConfigurationRegistry::new();
    assert_eq!(configurations.load(&FileLoader::new(dir.path())), 1);
    assert_eq!(configurations.by_source(Source::Json).len(), 0);
    assert_eq!(configurations.by_source(Source::Yaml).len(), 1);
}

#[test]
fn test_empty_directory_uses_defaults() {
    let dir = TempDir::new().unwrap();

    let registry = AgentRegistry::new(catalog());
    assert_eq!(registry.load(&FileLoader::new(dir.path())), 0);
    assert_eq!(registry.history_size(), agentry::config::DEFAULT_MAX_HISTORY_SIZE);

    assert_eq!(registry.discover(""), 2);
    let agent = registry.find_by_name("cleanup::temp").unwrap();
    assert_eq!(agent.config().source(), Source::Discovered);
    assert_eq!(agent.config().schedule(), "1 hour");
}

#[test]
fn test_registry_instantiates_from_files() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "agents.json", JSON_CONFIG);
    write_config(dir.path(), "agents.yaml", YAML_CONFIG);

    let registry = AgentRegistry::new(catalog());
    registry.load(&FileLoader::new(dir.path()));
    assert_eq!(registry.discover(""), 2);
    assert_eq!(registry.names(), vec!["cleanup::temp", "nightly-report"]);

    let nightly = registry.find_by_name("nightly-report").unwrap();
    assert_eq!(nightly.config().kind(), ScheduleKind::Cron);
    assert!(nightly.config().statistics());

    let cleanup = registry.find_by_name("cleanup::temp").unwrap();
    assert_eq!(cleanup.config().schedule(), "15 minutes");
    assert_eq!(cleanup.config().source(), Source::Json);
}

#[test]
fn test_resolved_configurations_validate() {
    let dir = TempDir::new().unwrap();
    write_config(
        dir.path(),
        "agents.yaml",
        r#"
agents:
  - implementation: good
    kind: cron
    schedule: "*/5 * * * *"
  - implementation: bad
    kind: cron
    schedule: "*/5 * * *"
"#,
    );

    let mut configurations = ConfigurationRegistry::new();
    configurations.load(&FileLoader::new(dir.path()));

    let good = configurations.highest_precedence("good").unwrap();
    assert!(good.validate().is_ok());

    let bad = configurations.highest_precedence("bad").unwrap();
    assert!(matches!(
        bad.validate(),
        Err(agentry::ConfigError::Schedule { .. })
    ));
}
