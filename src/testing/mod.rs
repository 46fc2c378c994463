//! Testing utilities for users of the agentry library.
//!
//! This module provides reusable tasks for exercising agents:
//!
//! - [`CountingTask`]: counts executions, optionally taking some time
//! - [`FailingTask`]: errors a fixed number of times, then succeeds
//! - [`GatedTask`]: blocks each execution until released
//!
//! and [`wait_until`] for polling a condition in async tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

use crate::core::task::{Task, TaskError};

/// A task that counts how many times it ran.
///
/// # Example
///
/// ```
/// use agentry::testing::CountingTask;
///
/// let task = CountingTask::new();
/// assert_eq!(task.count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct CountingTask {
    count: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every execution take `delay` (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completed executions.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for CountingTask {
    async fn execute(&self) -> Result<(), TaskError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A task that errors for its first `n` executions, then succeeds.
///
/// ```
/// use agentry::testing::FailingTask;
///
/// let flaky = FailingTask::new(2);
/// let broken = FailingTask::always("disk full");
/// assert_eq!(flaky.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct FailingTask {
    remaining: AtomicU32,
    calls: AtomicU32,
    message: String,
}

impl FailingTask {
    pub fn new(failures: u32) -> Self {
        Self::with_error(failures, "induced failure")
    }

    pub fn with_error(failures: u32, message: impl Into<String>) -> Self {
        Self {
            remaining: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            message: message.into(),
        }
    }

    /// A task that never succeeds.
    pub fn always(message: impl Into<String>) -> Self {
        Self::with_error(u32::MAX, message)
    }

    /// Executions so far, failed or not.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for FailingTask {
    async fn execute(&self) -> Result<(), TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TaskError::ExecutionFailed(self.message.clone()));
        }
        Ok(())
    }
}

/// A task that blocks every execution until [`GatedTask::release`] is called.
///
/// Useful for observing an agent while its task is in flight.
#[derive(Debug)]
pub struct GatedTask {
    started: AtomicUsize,
    finished: AtomicUsize,
    started_signal: Notify,
    gate: Semaphore,
}

impl Default for GatedTask {
    fn default() -> Self {
        Self {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            started_signal: Notify::new(),
            gate: Semaphore::new(0),
        }
    }
}

impl GatedTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions that have begun.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of executions that have returned.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Wait until at least one execution has begun.
    pub async fn wait_started(&self) {
        while self.started() == 0 {
            self.started_signal.notified().await;
        }
    }

    /// Let one blocked (or future) execution finish.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Task for GatedTask {
    async fn execute(&self) -> Result<(), TaskError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.started_signal.notify_one();

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TaskError::ExecutionFailed(e.to_string()))?;
        permit.forget();

        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` every 10ms until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within 5 seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let timeout = Duration::from_secs(5);
    let start = tokio::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("Timeout waiting for condition after {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
