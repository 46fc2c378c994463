//! Bounded history of execution durations.

use std::collections::VecDeque;
use std::time::Duration;

/// Bounded FIFO of recent durations; the oldest entry is evicted when full.
/// A zero capacity records nothing. Storage grows with use, not with the
/// capacity.
#[derive(Debug, Clone, Default)]
pub struct DurationHistory {
    capacity: usize,
    entries: VecDeque<Duration>,
}

impl DurationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, duration: Duration) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(duration);
    }

    /// Mean of the recorded durations.
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.entries.len()).ok().filter(|n| *n > 0)?;
        let total: Duration = self.entries.iter().sum();
        Some(total / count)
    }

    /// Recorded durations, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.entries.iter()
    }
}
