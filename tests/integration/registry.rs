//! Agent registry integration tests.
//!
//! Tests that verify discovery by scope, configuration precedence across
//! sources, name-based management and status reporting.

use agentry::testing::CountingTask;
use agentry::{
    AgentConfiguration, AgentConfigurationBuilder, AgentError, AgentRegistry, AgentScanner,
    AgentState, ConfigurationDocument, RegistryError, ScheduleKind, Source, Task, TaskCatalog,
};
use std::sync::Arc;

use crate::common::{cron_agent, interval_agent, registry_with};

fn counting() -> Arc<dyn Task> {
    Arc::new(CountingTask::new())
}

fn catalog() -> TaskCatalog {
    let mut catalog = TaskCatalog::new();
    catalog
        .register_task(interval_agent("reports::nightly", "1 hour"), counting())
        .unwrap()
        .register_task(interval_agent("reports.weekly", "1 hour"), counting())
        .unwrap()
        .register_task(interval_agent("cleanup::temp", "5 minutes"), counting())
        .unwrap();
    catalog
}

#[test]
fn test_discover_within_scope() {
    let registry = AgentRegistry::new(catalog());

    assert_eq!(registry.discover("reports"), 2);
    assert_eq!(registry.names(), vec!["reports.weekly", "reports::nightly"]);

    assert_eq!(registry.discover("cleanup"), 1);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_discover_twice_adds_nothing() {
    let registry = AgentRegistry::new(catalog());

    assert_eq!(registry.discover(""), 3);
    assert_eq!(registry.discover(""), 0);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_discover_unknown_scope_finds_nothing() {
    let registry = AgentRegistry::new(catalog());
    assert_eq!(registry.discover("billing"), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_file_configuration_overrides_discovered() {
    let yaml = r#"
agents:
  - implementation: reports::nightly
    name: nightly-report
    kind: cron
    schedule: "0 2 * * *"
    statistics: true
"#;
    let document: ConfigurationDocument = serde_yaml::from_str(yaml).unwrap();

    let registry = AgentRegistry::new(catalog());
    let mut configurations = agentry::ConfigurationRegistry::new();
    configurations.load_document(Source::Yaml, &document);
    let registry = registry.with_configurations(configurations);

    registry.discover("reports");

    let agent = registry.find_by_name("nightly-report").unwrap();
    let config = agent.config();
    assert_eq!(config.source(), Source::Yaml);
    assert_eq!(config.kind(), ScheduleKind::Cron);
    assert_eq!(config.schedule(), "0 2 * * *");
    assert!(config.statistics());

    // The discovered defaults are still recorded as a candidate.
    let configurations = registry.configurations();
    assert_eq!(configurations.candidates("reports::nightly").len(), 2);
}

#[test]
fn test_added_configuration_wins_over_discovered() {
    let registry = AgentRegistry::new(catalog());
    registry.add_configuration(
        interval_agent("cleanup::temp", "30 seconds")
            .build_with_source(Source::Json)
            .unwrap(),
    );

    registry.discover("cleanup");
    let agent = registry.find_by_name("cleanup::temp").unwrap();
    assert_eq!(agent.config().schedule(), "30 seconds");
    assert_eq!(agent.config().source(), Source::Json);
}

#[test]
fn test_invalid_schedule_is_skipped() {
    let registry = AgentRegistry::new(catalog());
    registry.add_configuration(
        cron_agent("cleanup::temp", "not a cron")
            .build_with_source(Source::Yaml)
            .unwrap(),
    );

    assert_eq!(registry.discover(""), 2);
    assert!(matches!(
        registry.find_by_name("cleanup::temp"),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn test_duplicate_name_is_skipped() {
    let mut catalog = TaskCatalog::new();
    catalog
        .register_task(interval_agent("a::first", "1m").name("shared"), counting())
        .unwrap()
        .register_task(interval_agent("b::second", "1m").name("shared"), counting())
        .unwrap();

    let registry = AgentRegistry::new(catalog);
    assert_eq!(registry.discover(""), 1);

    let agent = registry.find_by_name("shared").unwrap();
    assert_eq!(agent.config().implementation(), "a::first");
}

struct FixedScanner {
    candidates: Vec<AgentConfiguration>,
}

impl AgentScanner for FixedScanner {
    fn scan(&self, _scope: &str) -> Vec<AgentConfiguration> {
        self.candidates.clone()
    }
}

#[test]
fn test_custom_scanner_without_factory_is_skipped() {
    let candidates = vec![
        interval_agent("cleanup::temp", "1m")
            .build_with_source(Source::Discovered)
            .unwrap(),
        AgentConfigurationBuilder::new()
            .implementation("ghost::agent")
            .kind(ScheduleKind::Interval)
            .build_with_source(Source::Discovered)
            .unwrap(),
    ];

    let registry =
        AgentRegistry::new(catalog()).with_scanner(Arc::new(FixedScanner { candidates }));

    assert_eq!(registry.discover("anything"), 1);
    assert_eq!(registry.names(), vec!["cleanup::temp"]);
}

#[test]
fn test_find_by_blank_name_fails() {
    let registry = registry_with(vec![(interval_agent("cleanup::temp", "1m"), counting())]);

    assert!(matches!(
        registry.find_by_name(""),
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        registry.find_by_name("   "),
        Err(RegistryError::NotFound(_))
    ));
    assert!(matches!(
        registry.is_running("missing"),
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_all_and_stop_all() {
    let registry = AgentRegistry::new(catalog());
    registry.discover("");

    let failures = registry.start_all().await;
    assert!(failures.is_empty());
    assert!(registry.agents().iter().all(|a| a.is_started()));

    registry.stop("cleanup::temp").await.unwrap();

    // Started agents report AlreadyStarted, the stopped one needs a reset.
    let failures = registry.start_all().await;
    assert_eq!(failures.len(), 3);
    let (_, error) = failures
        .iter()
        .find(|(name, _)| name == "cleanup::temp")
        .unwrap();
    assert!(matches!(error, AgentError::IllegalState { .. }));

    assert_eq!(registry.stop_all().await, 2);
    assert!(registry.agents().iter().all(|a| a.is_stopped()));
}

#[tokio::test]
async fn test_reset_replaces_agent() {
    let registry = registry_with(vec![(interval_agent("cleanup::temp", "1m"), counting())]);

    registry.run_now("cleanup::temp").await.unwrap();
    let old = registry.find_by_name("cleanup::temp").unwrap();
    assert!(old.last_run_start().is_some());

    let fresh = registry.reset("cleanup::temp").unwrap();
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert_eq!(fresh.state(), AgentState::Set);
    assert!(fresh.last_run_start().is_none());
    assert!(Arc::ptr_eq(
        &fresh,
        &registry.find_by_name("cleanup::temp").unwrap()
    ));
}

#[tokio::test]
async fn test_status_json() {
    let registry = registry_with(vec![
        (interval_agent("cleanup::temp", "1m"), counting()),
        (
            cron_agent("reports::nightly", "0 2 * * *").statistics(true),
            counting(),
        ),
    ]);

    let json: serde_json::Value =
        serde_json::from_str(&registry.status_json("cleanup::temp").unwrap()).unwrap();
    assert_eq!(json["name"], "cleanup::temp");
    assert_eq!(json["kind"], "interval");
    assert_eq!(json["state"], "SET");
    assert_eq!(json["average_duration"], "not enabled");
    assert_eq!(json["interval"], "1 minute(s)");
    assert!(json["start_time"].is_null());
    assert!(json.get("cron_expression").is_none());

    registry.start("reports::nightly").await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&registry.status_json("reports::nightly").unwrap()).unwrap();
    assert_eq!(json["kind"], "cron");
    assert_eq!(json["state"], "STARTED");
    assert_eq!(json["average_duration"], "no data");
    assert_eq!(json["cron_expression"], "0 2 * * *");
    assert!(json.get("interval").is_none());
    assert!(json["next_execution"].is_string());
    assert!(json["start_time"].is_string());

    registry.stop("reports::nightly").await.unwrap();
}
