//! The unit of work an agent runs.
//!
//! The `Task` trait is the unit of work an agent executes on every firing.
//! Implement it directly, or wrap an async closure with [`task_fn`].

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Why one firing of a task failed.
///
/// The owning agent logs the error and keeps its schedule.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The task exceeded its time limit.
    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// External command failed with exit code (`-1` when killed by a signal).
    #[error("command exited with code {code}")]
    CommandFailed { code: i32, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error raised by a user task.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The core trait for defining agent work.
///
/// # Example
///
/// ```ignore
/// use agentry::{Task, TaskError};
/// use async_trait::async_trait;
///
/// struct CleanupTask;
///
/// #[async_trait]
/// impl Task for CleanupTask {
///     async fn execute(&self) -> Result<(), TaskError> {
///         // purge expired sessions
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Execute one firing of the task.
    ///
    /// Errors are logged by the owning agent and never stop it.
    async fn execute(&self) -> Result<(), TaskError>;

    /// Human-readable summary, e.g. a command line.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// A task backed by an async closure.
pub struct FnTask<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn execute(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}

/// Wrap an async closure as a [`Task`].
pub fn task_fn<F, Fut>(f: F) -> FnTask<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    FnTask { f }
}
