//! Human-readable time intervals.
//!
//! Intervals are written as an amount followed by an optional unit, such as
//! `"30 seconds"`, `"5m"` or `"1 HOUR"`. When the unit is omitted, minutes
//! are assumed.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::schedule::ScheduleError;

/// Time unit of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Unit assumed when the text has no letters.
    pub const DEFAULT: TimeUnit = TimeUnit::Minutes;

    const ALIASES: [(TimeUnit, &'static [&'static str]); 3] = [
        (TimeUnit::Seconds, &["s", "sec", "second", "seconds"]),
        (TimeUnit::Minutes, &["m", "min", "minute", "minutes"]),
        (TimeUnit::Hours, &["h", "hr", "hour", "hours"]),
    ];

    /// Find the unit matching an alias, ignoring case.
    pub fn from_alias(alias: &str) -> Option<TimeUnit> {
        Self::ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)))
            .map(|(unit, _)| *unit)
    }

    /// Number of seconds in one unit.
    pub fn seconds(&self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Seconds => write!(f, "second(s)"),
            TimeUnit::Minutes => write!(f, "minute(s)"),
            TimeUnit::Hours => write!(f, "hour(s)"),
        }
    }
}

/// A fixed interval between executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    amount: u32,
    unit: TimeUnit,
}

impl TimeInterval {
    /// Create an interval from its parts.
    pub fn new(amount: u32, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Parse an interval expression.
    ///
    /// The first run of digits is the amount and the first run of letters is
    /// the unit, so `"30s"`, `"30 seconds"` and `"30 SECOND"` are all the same
    /// interval. Without letters the unit is minutes.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let digits = first_run(text, |c| c.is_ascii_digit())
            .ok_or_else(|| ScheduleError::InvalidInterval(format!("no digits in '{}'", text)))?;
        let amount: u32 = digits.parse().map_err(|_| {
            ScheduleError::InvalidInterval(format!("amount out of range in '{}'", text))
        })?;
        if amount == 0 {
            return Err(ScheduleError::InvalidInterval(format!("zero interval in '{}'", text)));
        }

        let unit = match first_run(text, |c| c.is_ascii_alphabetic()) {
            Some(letters) => TimeUnit::from_alias(letters)
                .ok_or_else(|| ScheduleError::UnknownTimeUnit(letters.to_string()))?,
            None => TimeUnit::DEFAULT,
        };

        Ok(Self { amount, unit })
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// The interval as a standard duration.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.amount) * self.unit.seconds())
    }
}

impl FromStr for TimeInterval {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit)
    }
}

/// Returns the first contiguous run of characters matching `pred`.
fn first_run(text: &str, pred: impl Fn(char) -> bool) -> Option<&str> {
    let start = text.find(&pred)?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Next wall-clock instant that lands on a multiple of `interval`.
///
/// The multiple is taken on the field matching the interval unit (second of
/// minute, minute of hour, hour of day) and finer fields are zeroed, so a
/// 30-second interval aligns on `:00`/`:30` and a 1-hour interval on the
/// next full hour. The result is always strictly after `now`.
pub fn next_aligned_instant<Tz: TimeZone>(
    interval: &TimeInterval,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let local = now.naive_local();
    let aligned = next_aligned_naive(interval, local);
    let zone = now.timezone();

    zone.from_local_datetime(&aligned)
        .earliest()
        // Aligned instant fell into a DST gap; keep the same offset from `now`.
        .unwrap_or_else(|| now.clone() + (aligned - local))
}

fn next_aligned_naive(interval: &TimeInterval, now: NaiveDateTime) -> NaiveDateTime {
    let amount = i64::from(interval.amount);
    let (field, step) = match interval.unit {
        TimeUnit::Seconds => (now.second(), ChronoDuration::seconds(1)),
        TimeUnit::Minutes => (now.minute(), ChronoDuration::minutes(1)),
        TimeUnit::Hours => (now.hour(), ChronoDuration::hours(1)),
    };

    let remainder = i64::from(field) % amount;
    let advance = if remainder == 0 { 0 } else { amount - remainder };
    let mut next = now + step * advance as i32;
    if next <= now {
        next += step * amount as i32;
    }

    let truncated = match interval.unit {
        TimeUnit::Hours => next.with_minute(0).and_then(|t| t.with_second(0)),
        TimeUnit::Minutes => next.with_second(0),
        TimeUnit::Seconds => Some(next),
    };

    truncated
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(next)
}
