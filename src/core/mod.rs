//! Core building blocks: schedule parsing and the task abstraction.

pub mod interval;
pub mod schedule;
pub mod task;
