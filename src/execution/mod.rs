//! Built-in task implementations.
//!
//! This module provides tasks that run outside the process, such as external
//! commands.

mod command;

pub use command::{CommandSpec, CommandTask};
