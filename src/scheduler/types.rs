//! Scheduler type definitions.
//!
//! This module contains error types, state enums, and status records for
//! agents and the agent registry.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, ScheduleKind};

/// Timestamp format used in status records.
pub const STATUS_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Errors raised by agent lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// `start` on an agent that is already started.
    #[error("agent '{0}' is already started")]
    AlreadyStarted(String),

    /// `stop` on an agent that is already stopped.
    #[error("agent '{0}' is already stopped")]
    AlreadyStopped(String),

    /// Manual run while a run is in progress.
    #[error("agent '{0}' is already running")]
    AlreadyRunning(String),

    /// Operation not allowed in the current state.
    #[error("agent '{name}' {reason}")]
    IllegalState { name: String, reason: String },
}

/// Errors raised by the agent registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No agent with that name.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the agent's current state.
    #[error("agent '{name}' {reason}")]
    IllegalState { name: String, reason: String },

    /// Lifecycle error from the agent itself.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Configuration error while instantiating an agent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to render a status record.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    /// Created, never started.
    Set,
    /// Armed and firing on schedule.
    Started,
    /// A task is executing.
    Running,
    /// Stopped; a reset is required before starting again.
    Stopped,
    /// Reserved for embedders; never entered by the scheduler itself.
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Set => "SET",
            AgentState::Started => "STARTED",
            AgentState::Running => "RUNNING",
            AgentState::Stopped => "STOPPED",
            AgentState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Average execution duration as reported in status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageDuration {
    /// Statistics are disabled for the agent.
    NotEnabled,
    /// Statistics are enabled but nothing has run yet.
    NoData,
    Value(Duration),
}

impl fmt::Display for AverageDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageDuration::NotEnabled => f.write_str("not enabled"),
            AverageDuration::NoData => f.write_str("no data"),
            AverageDuration::Value(d) => f.write_str(&format_duration(*d)),
        }
    }
}

impl Serialize for AverageDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Cron-specific part of a status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CronStatus {
    pub cron_expression: String,
    #[serde(serialize_with = "serialize_date")]
    pub next_execution: Option<DateTime<Local>>,
}

/// Interval-specific part of a status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalStatus {
    /// Normalized interval text, e.g. `30 second(s)`.
    pub interval: String,
}

/// Point-in-time snapshot of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub kind: ScheduleKind,
    pub state: AgentState,
    #[serde(serialize_with = "serialize_date")]
    pub start_time: Option<DateTime<Local>>,
    #[serde(serialize_with = "serialize_date")]
    pub last_run_start: Option<DateTime<Local>>,
    #[serde(serialize_with = "serialize_duration")]
    pub last_run_duration: Option<Duration>,
    pub average_duration: AverageDuration,
    #[serde(flatten)]
    pub interval: Option<IntervalStatus>,
    #[serde(flatten)]
    pub cron: Option<CronStatus>,
}

/// Render a duration as seconds with millisecond precision, e.g. `1.250s`.
pub fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

fn serialize_date<S: Serializer>(
    value: &Option<DateTime<Local>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(date) => serializer.collect_str(&date.format(STATUS_DATE_FORMAT)),
        None => serializer.serialize_none(),
    }
}

fn serialize_duration<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_str(&format_duration(*duration)),
        None => serializer.serialize_none(),
    }
}
