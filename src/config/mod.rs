//! Agent configuration and layered sources.
//!
//! Configurations are built with [`AgentConfigurationBuilder`], collected from
//! several [`Source`]s into a [`ConfigurationRegistry`], and resolved per
//! implementation by precedence.

mod agent;
mod error;
mod loader;
mod registry;
mod source;

pub use agent::{AgentConfiguration, AgentConfigurationBuilder, ScheduleKind};
pub use error::ConfigError;
pub use loader::{AgentEntry, ConfigurationDocument, ConfigurationLoader, FileLoader};
pub use registry::{
    ConfigurationRegistry, DEFAULT_MAX_HISTORY_SIZE, GlobalConfig, HISTORY_SIZE_LIMIT,
};
pub use source::Source;
