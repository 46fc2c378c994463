//! Cron expression parsing and next occurrence calculation.
//!
//! Expressions use the standard 5-field grammar
//! (`minute hour day-of-month month day-of-week`). Numeric weekdays follow
//! UNIX cron: 0 and 7 are Sunday, 1 is Monday. Occurrences are computed in
//! whatever timezone the reference instant carries, which for running agents
//! is the local wall clock.

use chrono::{DateTime, TimeZone};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when parsing schedule text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval expression.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// Interval unit not recognised.
    #[error("unknown time unit: {0}")]
    UnknownTimeUnit(String),
}

/// A validated cron schedule.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    /// The original expression string.
    expression: String,
    inner: cron::Schedule,
}

impl CronSchedule {
    /// Parse a 5-field cron expression.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let trimmed = expression.trim();
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        if fields.len() != 5 {
            return Err(ScheduleError::InvalidCron(format!(
                "expected 5 fields, got {} in '{}'",
                fields.len(),
                trimmed
            )));
        }

        // The cron crate expects a leading seconds field and numbers weekdays
        // from 1 (Sunday).
        let invalid = |e: String| ScheduleError::InvalidCron(format!("'{}': {}", trimmed, e));
        let weekdays = crate_day_of_week(fields[4]).map_err(invalid)?;
        let inner =
            cron::Schedule::from_str(&format!("0 {} {}", fields[..4].join(" "), weekdays))
                .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            expression: trimmed.to_string(),
            inner,
        })
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `now`, if any exists.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.inner.after(now).next()
    }

    /// Time remaining until the next occurrence after `now`.
    pub fn time_to_next<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        let next = self.next_after(now)?;
        // Occurrences are whole seconds, so a sub-second `now` can never be
        // later than `next`; clamp anyway.
        Some((next - now.clone()).to_std().unwrap_or(Duration::ZERO))
    }

    /// The next `n` occurrences after `now`.
    pub fn upcoming<Tz: TimeZone>(&self, now: &DateTime<Tz>, n: usize) -> Vec<DateTime<Tz>> {
        self.inner.after(now).take(n).collect()
    }
}

/// Rewrite a UNIX day-of-week field (0-7, Sunday = 0 or 7) into the
/// numbering of the `cron` crate (1-7, Sunday = 1).
///
/// Purely numeric list elements are expanded and renumbered. Elements using
/// names or `*` are passed through; `*/n` selects the same days either way.
fn crate_day_of_week(field: &str) -> Result<String, String> {
    let mut days = Vec::new();
    let mut rewritten = Vec::new();

    for element in field.split(',') {
        if !element.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '/') {
            rewritten.push(element.to_string());
            continue;
        }

        let (base, step) = match element.split_once('/') {
            Some((base, step)) => {
                let step: u8 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("invalid day-of-week step '{}'", element))?;
                (base, Some(step))
            }
            None => (element, None),
        };

        let day = |text: &str| {
            text.parse::<u8>()
                .ok()
                .filter(|d| *d <= 7)
                .ok_or_else(|| format!("invalid day of week '{}'", element))
        };
        let (first, last) = match base.split_once('-') {
            Some((first, last)) => (day(first)?, day(last)?),
            None if step.is_some() => (day(base)?, 6),
            None => (day(base)?, day(base)?),
        };
        if first > last {
            return Err(format!("descending day-of-week range '{}'", element));
        }

        let step = usize::from(step.unwrap_or(1));
        days.extend((first..=last).step_by(step).map(|d| d % 7 + 1));
    }

    days.sort_unstable();
    days.dedup();
    rewritten.extend(days.iter().map(u8::to_string));
    Ok(rewritten.join(","))
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}
