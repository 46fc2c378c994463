//! The agent state machine.
//!
//! An [`Agent`] couples one [`AgentConfiguration`], one [`Task`] and one
//! [`Trigger`]. Lifecycle transitions (`start`/`stop`) and task execution
//! (`run`) are guarded by two independent locks, so a stop never waits for a
//! task in flight; it only prevents the next scheduled run.

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::history::DurationHistory;
use super::trigger::Trigger;
use super::types::{AgentError, AgentState, AgentStatus, AverageDuration};
use crate::config::{AgentConfiguration, ConfigError};
use crate::core::task::Task;

/// Mutable runtime data of an agent.
#[derive(Debug)]
struct Runtime {
    lifecycle: AgentState,
    running: bool,
    started_at: Option<DateTime<Local>>,
    last_run: Option<DateTime<Local>>,
    last_duration: Option<Duration>,
    history: DurationHistory,
}

impl Runtime {
    fn state(&self) -> AgentState {
        if self.running {
            AgentState::Running
        } else {
            self.lifecycle
        }
    }
}

/// A named unit of recurring work.
pub struct Agent {
    config: AgentConfiguration,
    task: Arc<dyn Task>,
    trigger: Trigger,
    runtime: Mutex<Runtime>,
    stop_requested: AtomicBool,
    /// Set once the agent is removed from (or replaced in) its registry.
    retired: AtomicBool,
    lifecycle_lock: tokio::sync::Mutex<()>,
    execution_lock: tokio::sync::Mutex<()>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a> {
    agent: &'a Agent,
}

impl<'a> RunningGuard<'a> {
    fn enter(agent: &'a Agent) -> Self {
        let mut runtime = agent.runtime();
        runtime.running = true;
        runtime.last_run = Some(Local::now());
        Self { agent }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.agent.runtime().running = false;
    }
}

impl Agent {
    /// Create an agent in state `Set`.
    ///
    /// `history_size` is the number of durations kept when statistics are
    /// enabled.
    pub fn new(
        config: AgentConfiguration,
        task: Arc<dyn Task>,
        history_size: usize,
    ) -> Result<Self, ConfigError> {
        let trigger = Trigger::for_config(&config)?;
        let capacity = if config.statistics() { history_size } else { 0 };

        Ok(Self {
            config,
            task,
            trigger,
            runtime: Mutex::new(Runtime {
                lifecycle: AgentState::Set,
                running: false,
                started_at: None,
                last_run: None,
                last_duration: None,
                history: DurationHistory::new(capacity),
            }),
            stop_requested: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            lifecycle_lock: tokio::sync::Mutex::new(()),
            execution_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn config(&self) -> &AgentConfiguration {
        &self.config
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Arm the trigger.
    ///
    /// Fails if the agent is already started, even while a run is in progress,
    /// and if it was stopped (a stopped agent must be reset).
    pub async fn start(self: &Arc<Self>) -> Result<(), AgentError> {
        let _lifecycle = self.lifecycle_lock.lock().await;

        if self.retired.load(Ordering::SeqCst) {
            return Err(AgentError::IllegalState {
                name: self.name().to_string(),
                reason: "was removed from its registry".to_string(),
            });
        }

        {
            let mut runtime = self.runtime();
            match runtime.lifecycle {
                AgentState::Started => {
                    return Err(AgentError::AlreadyStarted(self.name().to_string()));
                }
                AgentState::Stopped => {
                    return Err(AgentError::IllegalState {
                        name: self.name().to_string(),
                        reason: "was stopped, reset required".to_string(),
                    });
                }
                _ => {}
            }
            runtime.lifecycle = AgentState::Started;
            runtime.started_at = Some(Local::now());
        }

        self.trigger.arm(self);

        tracing::info!(
            agent = %self.name(),
            kind = %self.config.kind(),
            schedule = %self.config.schedule(),
            "Agent started"
        );
        Ok(())
    }

    /// Disarm the trigger. A run in progress completes; no further scheduled
    /// run starts.
    pub async fn stop(&self) -> Result<(), AgentError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        let _lifecycle = self.lifecycle_lock.lock().await;

        if self.runtime().lifecycle == AgentState::Stopped {
            return Err(AgentError::AlreadyStopped(self.name().to_string()));
        }

        self.trigger.disarm();

        {
            let mut runtime = self.runtime();
            runtime.lifecycle = AgentState::Stopped;
            runtime.started_at = None;
        }

        tracing::info!(agent = %self.name(), "Agent stopped");
        Ok(())
    }

    /// Execute the task once.
    ///
    /// A scheduled (`manual == false`) run is skipped silently after a stop
    /// was requested, and skipped with a log line while another run is in
    /// progress. A manual run in that case fails with
    /// [`AgentError::AlreadyRunning`]. Task errors are logged, never returned.
    pub async fn run(self: &Arc<Self>, manual: bool) -> Result<(), AgentError> {
        if !manual && self.stop_requested.load(Ordering::SeqCst) {
            return Ok(());
        }

        let Ok(_execution) = self.execution_lock.try_lock() else {
            if manual {
                return Err(AgentError::AlreadyRunning(self.name().to_string()));
            }
            tracing::info!(agent = %self.name(), "Agent still running, skipping scheduled run");
            return Ok(());
        };

        let _running = RunningGuard::enter(self);
        let started = tokio::time::Instant::now();
        tracing::debug!(agent = %self.name(), manual, "Agent run started");

        match self.task.execute().await {
            Ok(()) => {
                let elapsed = started.elapsed();
                {
                    let mut runtime = self.runtime();
                    runtime.last_duration = Some(elapsed);
                    runtime.history.push(elapsed);
                }
                tracing::debug!(
                    agent = %self.name(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Agent run completed"
                );
                self.trigger.after_run(self);
            }
            Err(e) => {
                tracing::error!(agent = %self.name(), error = %e, "Agent task failed");
            }
        }

        Ok(())
    }

    /// Mark an idle agent as retired so it can never be started again.
    ///
    /// Fails with the reason when the agent is started, running, or in the
    /// middle of a start or stop.
    pub(crate) fn retire(&self) -> Result<(), &'static str> {
        let Ok(_lifecycle) = self.lifecycle_lock.try_lock() else {
            return Err("is changing state");
        };
        let runtime = self.runtime();
        if runtime.running {
            return Err("is running");
        }
        if runtime.lifecycle == AgentState::Started {
            return Err("is started");
        }
        self.retired.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Whether a scheduled re-arm is still wanted.
    pub(crate) fn accepts_reschedule(&self) -> bool {
        self.is_started() && !self.stop_requested.load(Ordering::SeqCst)
    }

    /// Current state; `Running` while a task executes.
    pub fn state(&self) -> AgentState {
        self.runtime().state()
    }

    /// The lifecycle state underneath a run, restored when the run ends.
    pub fn previous_state(&self) -> AgentState {
        self.runtime().lifecycle
    }

    pub fn is_started(&self) -> bool {
        self.runtime().lifecycle == AgentState::Started
    }

    pub fn is_stopped(&self) -> bool {
        self.runtime().lifecycle == AgentState::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.runtime().running
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.runtime().started_at
    }

    pub fn last_run_start(&self) -> Option<DateTime<Local>> {
        self.runtime().last_run
    }

    pub fn last_run_duration(&self) -> Option<Duration> {
        self.runtime().last_duration
    }

    pub fn average_duration(&self) -> AverageDuration {
        if !self.config.statistics() {
            return AverageDuration::NotEnabled;
        }
        self.runtime()
            .history
            .average()
            .map_or(AverageDuration::NoData, AverageDuration::Value)
    }

    /// Recorded durations, oldest first.
    pub fn duration_history(&self) -> Vec<Duration> {
        self.runtime().history.iter().copied().collect()
    }

    /// Next cron execution, when one is armed.
    pub fn next_execution(&self) -> Option<DateTime<Local>> {
        self.trigger.next_execution()
    }

    /// Snapshot for reporting.
    pub fn status(&self) -> AgentStatus {
        let average_duration = self.average_duration();
        let (state, start_time, last_run_start, last_run_duration) = {
            let runtime = self.runtime();
            (
                runtime.state(),
                runtime.started_at,
                runtime.last_run,
                runtime.last_duration,
            )
        };

        AgentStatus {
            name: self.name().to_string(),
            kind: self.config.kind(),
            state,
            start_time,
            last_run_start,
            last_run_duration,
            average_duration,
            interval: self.trigger.interval_status(),
            cron: self.trigger.cron_status(),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .field("kind", &self.config.kind())
            .field("state", &self.state())
            .finish()
    }
}
