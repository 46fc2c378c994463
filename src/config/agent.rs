//! Agent configuration and its builder.
//!
//! An [`AgentConfiguration`] is an immutable description of one agent. It is
//! produced by [`AgentConfigurationBuilder`], which is also what configuration
//! documents deserialize into.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ConfigError;
use super::source::Source;
use crate::core::interval::TimeInterval;
use crate::core::schedule::CronSchedule;

/// How an agent decides when to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fixed interval, optionally modulated onto clock boundaries.
    Interval,
    /// Calendar schedule from a cron expression.
    Cron,
}

impl ScheduleKind {
    /// Schedule text used when none is given.
    pub fn default_schedule(&self) -> &'static str {
        match self {
            ScheduleKind::Interval => "1 minute",
            ScheduleKind::Cron => "* * * * *",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Interval => f.write_str("interval"),
            ScheduleKind::Cron => f.write_str("cron"),
        }
    }
}

/// Resolved configuration of a single agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AgentConfiguration {
    name: String,
    implementation: String,
    kind: ScheduleKind,
    schedule: String,
    modulate: bool,
    statistics: bool,
    source: Source,
}

impl AgentConfiguration {
    /// Start building a configuration.
    pub fn builder() -> AgentConfigurationBuilder {
        AgentConfigurationBuilder::default()
    }

    /// Unique agent name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the task code; the merge key across sources.
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    /// Raw interval or cron text.
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    /// Whether an interval agent aligns its first run on a clock boundary.
    pub fn modulate(&self) -> bool {
        self.modulate
    }

    /// Whether execution durations are recorded.
    pub fn statistics(&self) -> bool {
        self.statistics
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// Parse the schedule text as an interval.
    pub fn interval(&self) -> Result<TimeInterval, ConfigError> {
        TimeInterval::parse(&self.schedule).map_err(|source| ConfigError::Schedule {
            name: self.name.clone(),
            source,
        })
    }

    /// Parse the schedule text as a cron expression.
    pub fn cron(&self) -> Result<CronSchedule, ConfigError> {
        CronSchedule::parse(&self.schedule).map_err(|source| ConfigError::Schedule {
            name: self.name.clone(),
            source,
        })
    }

    /// Check that the schedule text parses for the configured kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            ScheduleKind::Interval => self.interval().map(|_| ()),
            ScheduleKind::Cron => self.cron().map(|_| ()),
        }
    }
}

/// Builder for [`AgentConfiguration`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfigurationBuilder {
    name: Option<String>,
    implementation: Option<String>,
    kind: Option<ScheduleKind>,
    schedule: Option<String>,
    modulate: bool,
    statistics: bool,
}

impl AgentConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent name. Defaults to the implementation identifier.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the implementation identifier.
    pub fn implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    pub fn kind(mut self, kind: ScheduleKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the interval or cron text. Defaults to the kind's default.
    pub fn schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn modulate(mut self, modulate: bool) -> Self {
        self.modulate = modulate;
        self
    }

    pub fn statistics(mut self, statistics: bool) -> Self {
        self.statistics = statistics;
        self
    }

    /// The implementation identifier set so far.
    pub fn implementation_id(&self) -> Option<&str> {
        self.implementation.as_deref()
    }

    /// Build with [`Source::Default`].
    pub fn build(&self) -> Result<AgentConfiguration, ConfigError> {
        self.build_with_source(Source::Default)
    }

    /// Build and stamp the given source.
    pub fn build_with_source(&self, source: Source) -> Result<AgentConfiguration, ConfigError> {
        let implementation = non_blank(&self.implementation)
            .ok_or_else(|| ConfigError::MissingField("implementation".to_string()))?;
        let kind = self
            .kind
            .ok_or_else(|| ConfigError::MissingField("kind".to_string()))?;

        let name = non_blank(&self.name).unwrap_or(implementation);
        let schedule = non_blank(&self.schedule).unwrap_or(kind.default_schedule());

        Ok(AgentConfiguration {
            name: name.to_string(),
            implementation: implementation.to_string(),
            kind,
            schedule: schedule.to_string(),
            modulate: self.modulate,
            statistics: self.statistics,
            source,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
