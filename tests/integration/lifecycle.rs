//! Agent lifecycle integration tests.
//!
//! Tests that drive agents through start, stop, reset and removal via the
//! registry, including transitions attempted while a task is in flight.

use agentry::testing::{CountingTask, GatedTask, wait_until};
use agentry::{AgentError, AgentState, RegistryError, Task};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{interval_agent, registry_with, wait_for_state};

#[tokio::test(start_paused = true)]
async fn test_start_stop_reset_cycle() {
    let task = Arc::new(CountingTask::new());
    let registry = registry_with(vec![(
        interval_agent("jobs::cleanup", "10 minutes"),
        task.clone() as Arc<dyn Task>,
    )]);

    assert_eq!(registry.status("jobs::cleanup").unwrap().state, AgentState::Set);

    registry.start("jobs::cleanup").await.unwrap();
    assert!(registry.is_started("jobs::cleanup").unwrap());
    assert!(registry.status("jobs::cleanup").unwrap().start_time.is_some());

    registry.stop("jobs::cleanup").await.unwrap();
    assert!(registry.is_stopped("jobs::cleanup").unwrap());
    assert!(registry.status("jobs::cleanup").unwrap().start_time.is_none());

    // A stopped agent must be reset before it can start again.
    let err = registry.start("jobs::cleanup").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Agent(AgentError::IllegalState { .. })
    ));

    let fresh = registry.reset("jobs::cleanup").unwrap();
    assert_eq!(fresh.state(), AgentState::Set);
    assert!(fresh.last_run_start().is_none());

    registry.start("jobs::cleanup").await.unwrap();
    assert!(registry.is_started("jobs::cleanup").unwrap());
    registry.stop("jobs::cleanup").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_fails() {
    let registry = registry_with(vec![(
        interval_agent("jobs::cleanup", "10 minutes"),
        Arc::new(CountingTask::new()) as Arc<dyn Task>,
    )]);

    registry.start("jobs::cleanup").await.unwrap();
    let err = registry.start("jobs::cleanup").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Agent(AgentError::AlreadyStarted(ref name)) if name == "jobs::cleanup"
    ));

    registry.stop("jobs::cleanup").await.unwrap();
}

#[tokio::test]
async fn test_stop_twice_fails() {
    let registry = registry_with(vec![(
        interval_agent("jobs::cleanup", "10 minutes"),
        Arc::new(CountingTask::new()) as Arc<dyn Task>,
    )]);

    registry.stop("jobs::cleanup").await.unwrap();
    let err = registry.stop("jobs::cleanup").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Agent(AgentError::AlreadyStopped(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_fails_while_running() {
    let gate = Arc::new(GatedTask::new());
    let registry = registry_with(vec![(
        interval_agent("jobs::sync", "10 minutes"),
        gate.clone() as Arc<dyn Task>,
    )]);

    registry.start("jobs::sync").await.unwrap();
    gate.wait_started().await;

    assert!(registry.is_running("jobs::sync").unwrap());
    assert_eq!(registry.status("jobs::sync").unwrap().state, AgentState::Running);

    let err = registry.start("jobs::sync").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Agent(AgentError::AlreadyStarted(_))
    ));

    let err = registry.run_now("jobs::sync").await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Agent(AgentError::AlreadyRunning(_))
    ));

    gate.release();
    wait_for_state(&registry, "jobs::sync", AgentState::Started, Duration::from_secs(5)).await;
    registry.stop("jobs::sync").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_run_while_running_is_skipped() {
    let gate = Arc::new(GatedTask::new());
    let registry = registry_with(vec![(
        interval_agent("jobs::sync", "10 minutes"),
        gate.clone() as Arc<dyn Task>,
    )]);
    let agent = registry.find_by_name("jobs::sync").unwrap();

    let manual = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run(true).await })
    };
    gate.wait_started().await;

    agent.run(false).await.unwrap();
    assert_eq!(gate.started(), 1);

    gate.release();
    manual.await.unwrap().unwrap();
    assert_eq!(gate.finished(), 1);
    assert_eq!(agent.state(), AgentState::Set);
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_run_finish_and_suppresses_next() {
    let gate = Arc::new(GatedTask::new());
    let registry = registry_with(vec![(
        interval_agent("jobs::sync", "1 second"),
        gate.clone() as Arc<dyn Task>,
    )]);

    registry.start("jobs::sync").await.unwrap();
    gate.wait_started().await;

    registry.stop("jobs::sync").await.unwrap();
    let agent = registry.find_by_name("jobs::sync").unwrap();
    assert!(agent.is_stopped());
    assert!(agent.is_running());
    assert_eq!(agent.previous_state(), AgentState::Stopped);

    gate.release();
    wait_until(|| !agent.is_running()).await;
    assert_eq!(agent.state(), AgentState::Stopped);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(gate.started(), 1);
    assert!(!agent.trigger().is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_remove_requires_idle_agent() {
    let registry = registry_with(vec![(
        interval_agent("jobs::cleanup", "10 minutes"),
        Arc::new(CountingTask::new()) as Arc<dyn Task>,
    )]);

    registry.start("jobs::cleanup").await.unwrap();
    let err = registry.remove("jobs::cleanup").unwrap_err();
    assert!(matches!(err, RegistryError::IllegalState { .. }));

    registry.stop("jobs::cleanup").await.unwrap();
    let removed = registry.remove("jobs::cleanup").unwrap();
    assert_eq!(removed.name(), "jobs::cleanup");

    assert!(matches!(
        registry.find_by_name("jobs::cleanup"),
        Err(RegistryError::NotFound(_))
    ));
    assert!(registry.is_empty());

    // The implementation stays known, so rediscovery does not bring it back.
    assert_eq!(registry.discover(""), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_fails_while_started() {
    let registry = registry_with(vec![(
        interval_agent("jobs::cleanup", "10 minutes"),
        Arc::new(CountingTask::new()) as Arc<dyn Task>,
    )]);

    registry.start("jobs::cleanup").await.unwrap();
    assert!(matches!(
        registry.reset("jobs::cleanup"),
        Err(RegistryError::IllegalState { .. })
    ));
    registry.stop("jobs::cleanup").await.unwrap();
}

#[tokio::test]
async fn test_detached_agent_cannot_start() {
    let registry = registry_with(vec![
        (
            interval_agent("jobs::cleanup", "10 minutes"),
            Arc::new(CountingTask::new()) as Arc<dyn Task>,
        ),
        (
            interval_agent("jobs::sync", "10 minutes"),
            Arc::new(CountingTask::new()) as Arc<dyn Task>,
        ),
    ]);

    // Handles looked up before a remove or reset must not come back to life.
    let removed = registry.find_by_name("jobs::cleanup").unwrap();
    registry.remove("jobs::cleanup").unwrap();
    assert!(matches!(
        removed.start().await,
        Err(AgentError::IllegalState { .. })
    ));
    assert!(!removed.trigger().is_armed());

    let replaced = registry.find_by_name("jobs::sync").unwrap();
    let fresh = registry.reset("jobs::sync").unwrap();
    assert!(matches!(
        replaced.start().await,
        Err(AgentError::IllegalState { .. })
    ));

    fresh.start().await.unwrap();
    assert!(registry.is_started("jobs::sync").unwrap());
    registry.stop("jobs::sync").await.unwrap();
}
