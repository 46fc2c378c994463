//! Agents and their management.
//!
//! This module provides the agent state machine, the two scheduling
//! strategies that drive it, the task catalog used for discovery, and the
//! registry that manages agents by name.

mod agent;
mod catalog;
mod history;
mod registry;
mod trigger;
mod types;

pub use agent::Agent;
pub use catalog::{AgentScanner, TaskCatalog, TaskFactory, in_scope};
pub use history::DurationHistory;
pub use registry::AgentRegistry;
pub use trigger::{CronTrigger, IntervalTrigger, Trigger};
pub use types::{
    AgentError, AgentState, AgentStatus, AverageDuration, CronStatus, IntervalStatus,
    RegistryError, STATUS_DATE_FORMAT, format_duration,
};
