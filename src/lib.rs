//! Embeddable agent scheduler.
//!
//! An *agent* is a named unit of recurring work. It runs its [`Task`] either
//! on a fixed interval (optionally aligned to clock boundaries) or on a cron
//! schedule, tracks its lifecycle and execution statistics, and takes its
//! settings from whichever configuration [`Source`] has the highest
//! precedence.
//!
//! ```ignore
//! use agentry::{AgentConfigurationBuilder, AgentRegistry, ScheduleKind, TaskCatalog, task_fn};
//! use std::sync::Arc;
//!
//! let mut catalog = TaskCatalog::new();
//! catalog.register_task(
//!     AgentConfigurationBuilder::new()
//!         .implementation("reports::nightly")
//!         .kind(ScheduleKind::Cron)
//!         .schedule("0 2 * * *"),
//!     Arc::new(task_fn(|| async { Ok(()) })),
//! )?;
//!
//! let registry = AgentRegistry::new(catalog);
//! registry.discover("reports");
//! registry.start_all().await;
//! ```

pub mod config;
pub mod core;
pub mod execution;
pub mod scheduler;
pub mod testing;

pub use config::{
    AgentConfiguration, AgentConfigurationBuilder, ConfigError, ConfigurationDocument,
    ConfigurationLoader, ConfigurationRegistry, FileLoader, GlobalConfig, ScheduleKind, Source,
};
pub use core::interval::{TimeInterval, TimeUnit, next_aligned_instant};
pub use core::schedule::{CronSchedule, ScheduleError};
pub use core::task::{FnTask, Task, TaskError, task_fn};
pub use execution::{CommandSpec, CommandTask};
pub use scheduler::{
    Agent, AgentError, AgentRegistry, AgentScanner, AgentState, AgentStatus, AverageDuration,
    RegistryError, TaskCatalog, Trigger,
};
