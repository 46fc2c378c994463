//! Scheduling strategies.
//!
//! A [`Trigger`] owns the background timer of one agent and decides when the
//! agent's `run` is next invoked:
//!
//! - [`IntervalTrigger`] ticks at a fixed period, optionally delaying the
//!   first tick onto a clock boundary.
//! - [`CronTrigger`] arms a one-shot timer for the next cron occurrence and
//!   re-arms it after every successful run.
//!
//! Workers hold a weak reference to their agent and a cancellation channel,
//! so dropping or disarming a trigger ends its worker.

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::agent::Agent;
use super::types::{CronStatus, IntervalStatus};
use crate::config::{AgentConfiguration, ConfigError, ScheduleKind};
use crate::core::interval::{TimeInterval, next_aligned_instant};
use crate::core::schedule::CronSchedule;

/// Handle to a spawned timer worker.
struct TimerHandle {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Signal the worker to stop sleeping. A run already in progress is not
    /// interrupted.
    fn cancel(self) -> JoinHandle<()> {
        let _ = self.cancel.send(());
        self.task
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scheduling strategy of an agent.
pub enum Trigger {
    Interval(IntervalTrigger),
    Cron(CronTrigger),
}

impl Trigger {
    /// Build the trigger implied by a configuration's schedule kind.
    pub fn for_config(config: &AgentConfiguration) -> Result<Self, ConfigError> {
        match config.kind() {
            ScheduleKind::Interval => Ok(Trigger::Interval(IntervalTrigger::new(
                config.interval()?,
                config.modulate(),
            ))),
            ScheduleKind::Cron => Ok(Trigger::Cron(CronTrigger::new(config.cron()?))),
        }
    }

    pub(crate) fn arm(&self, agent: &Arc<Agent>) {
        match self {
            Trigger::Interval(t) => t.arm(agent),
            Trigger::Cron(t) => t.arm(agent),
        }
    }

    pub(crate) fn disarm(&self) {
        match self {
            Trigger::Interval(t) => t.disarm(),
            Trigger::Cron(t) => t.disarm(),
        }
    }

    /// Hook invoked after every successful run.
    pub(crate) fn after_run(&self, agent: &Arc<Agent>) {
        if let Trigger::Cron(t) = self {
            t.after_run(agent);
        }
    }

    /// Cached next execution; only cron triggers track one.
    pub fn next_execution(&self) -> Option<DateTime<Local>> {
        match self {
            Trigger::Interval(_) => None,
            Trigger::Cron(t) => t.next_execution(),
        }
    }

    pub(crate) fn interval_status(&self) -> Option<IntervalStatus> {
        match self {
            Trigger::Interval(t) => Some(IntervalStatus {
                interval: t.interval.to_string(),
            }),
            Trigger::Cron(_) => None,
        }
    }

    pub(crate) fn cron_status(&self) -> Option<CronStatus> {
        match self {
            Trigger::Interval(_) => None,
            Trigger::Cron(t) => Some(CronStatus {
                cron_expression: t.schedule.expression().to_string(),
                next_execution: t.next_execution(),
            }),
        }
    }

    /// Whether a timer worker is currently armed.
    pub fn is_armed(&self) -> bool {
        let slot = match self {
            Trigger::Interval(t) => &t.timer,
            Trigger::Cron(t) => &t.timer,
        };
        lock(slot).as_ref().is_some_and(|h| !h.task.is_finished())
    }
}

/// Fixed-period strategy.
pub struct IntervalTrigger {
    interval: TimeInterval,
    modulate: bool,
    timer: Mutex<Option<TimerHandle>>,
}

impl IntervalTrigger {
    pub fn new(interval: TimeInterval, modulate: bool) -> Self {
        Self {
            interval,
            modulate,
            timer: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> TimeInterval {
        self.interval
    }

    /// Delay before the first tick.
    pub fn initial_delay(&self) -> Duration {
        if !self.modulate {
            return Duration::ZERO;
        }
        let now = Local::now();
        (next_aligned_instant(&self.interval, &now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    fn arm(&self, agent: &Arc<Agent>) {
        let delay = self.initial_delay();
        let period = self.interval.as_duration();
        let weak = Arc::downgrade(agent);
        let (cancel, mut cancelled) = oneshot::channel::<()>();

        tracing::debug!(
            agent = %agent.name(),
            interval = %self.interval,
            delay_ms = delay.as_millis() as u64,
            "Arming interval timer"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {}
                }

                let Some(agent) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = agent.run(false).await {
                    tracing::debug!(agent = %agent.name(), error = %e, "Scheduled run skipped");
                }
            }
        });

        if let Some(previous) = lock(&self.timer).replace(TimerHandle { cancel, task }) {
            previous.cancel();
        }
    }

    fn disarm(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.cancel();
        }
    }
}

/// Self-rescheduling cron strategy.
pub struct CronTrigger {
    schedule: CronSchedule,
    timer: Mutex<Option<TimerHandle>>,
    next_execution: Mutex<Option<DateTime<Local>>>,
}

impl CronTrigger {
    pub fn new(schedule: CronSchedule) -> Self {
        Self {
            schedule,
            timer: Mutex::new(None),
            next_execution: Mutex::new(None),
        }
    }

    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    pub fn next_execution(&self) -> Option<DateTime<Local>> {
        *lock(&self.next_execution)
    }

    fn arm(&self, agent: &Arc<Agent>) {
        let mut slot = lock(&self.timer);
        self.schedule_next(&mut slot, agent);
    }

    fn after_run(&self, agent: &Arc<Agent>) {
        // Holding the slot while checking keeps a concurrent stop from
        // slipping between the check and the re-arm.
        let mut slot = lock(&self.timer);
        if agent.accepts_reschedule() {
            self.schedule_next(&mut slot, agent);
        } else {
            *lock(&self.next_execution) = None;
        }
    }

    fn disarm(&self) {
        let mut slot = lock(&self.timer);
        if let Some(handle) = slot.take() {
            handle.cancel();
        }
        *lock(&self.next_execution) = None;
    }

    fn schedule_next(&self, slot: &mut Option<TimerHandle>, agent: &Arc<Agent>) {
        let now = Local::now();
        let Some(next) = self.schedule.next_after(&now) else {
            tracing::warn!(
                agent = %agent.name(),
                cron = %self.schedule,
                "Cron schedule has no future execution"
            );
            *lock(&self.next_execution) = None;
            return;
        };

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
        *lock(&self.next_execution) = Some(next);

        let predecessor = slot.take().map(TimerHandle::cancel);
        let weak: Weak<Agent> = Arc::downgrade(agent);
        let (cancel, mut cancelled) = oneshot::channel::<()>();

        tracing::debug!(
            agent = %agent.name(),
            next_execution = %next.format("%Y-%m-%dT%H:%M:%S"),
            "Arming cron timer"
        );

        let task = tokio::spawn(async move {
            let fire = async move {
                tokio::time::sleep(delay).await;
                // Runs of one agent never overlap: wait out the previous worker.
                if let Some(previous) = predecessor {
                    let _ = previous.await;
                }
            };

            tokio::select! {
                biased;
                _ = &mut cancelled => return,
                _ = fire => {}
            }

            if let Some(agent) = weak.upgrade()
                && let Err(e) = agent.run(false).await
            {
                tracing::debug!(agent = %agent.name(), error = %e, "Scheduled run skipped");
            }
        });

        *slot = Some(TimerHandle { cancel, task });
    }
}
