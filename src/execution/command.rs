//! Agents backed by external programs.
//!
//! A [`CommandTask`] spawns one process per firing. The run fails when the
//! process cannot be spawned, exits non-zero, or outlives its time limit (the
//! child is killed in that case).
//!
//! Configuration documents describe commands with a [`CommandSpec`], either
//! as a bare argument vector or as a table:
//!
//! ```yaml
//! command: ["./report.sh", "--full"]
//! ---
//! command:
//!   run: ["./report.sh", "--full"]
//!   env: { REPORT_DIR: /var/reports }
//!   dir: /opt/reports
//!   timeout: 5 minutes
//! ```
//!
//! ```rust
//! use agentry::CommandTask;
//! use std::time::Duration;
//!
//! let task = CommandTask::new("./report.sh")
//!     .arg("--full")
//!     .env("REPORT_DIR", "/var/reports")
//!     .time_limit(Duration::from_secs(300));
//! assert_eq!(task.command_line(), "./report.sh --full");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::config::ConfigError;
use crate::core::interval::TimeInterval;
use crate::core::task::{Task, TaskError};

/// An external program run on every firing.
#[derive(Debug, Clone)]
pub struct CommandTask {
    /// Program followed by its arguments; never empty.
    argv: Vec<String>,
    env: BTreeMap<String, String>,
    dir: Option<PathBuf>,
    limit: Option<Duration>,
    line: String,
}

impl CommandTask {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            line: program.clone(),
            argv: vec![program],
            env: BTreeMap::new(),
            dir: None,
            limit: None,
        }
    }

    /// Build from an argument vector (`program arg...`). `None` when empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.as_str()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        self.line.push(' ');
        self.line.push_str(&arg);
        self.argv.push(arg);
        self
    }

    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |task, arg| task.arg(arg))
    }

    /// Set one environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Kill the process and fail the run after `limit`.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Program and arguments joined by spaces.
    pub fn command_line(&self) -> &str {
        &self.line
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.program());
        command
            .args(self.arguments())
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }

    async fn output(&self) -> Result<Output, TaskError> {
        let mut command = self.command();
        let spawned = command.output();
        let result = match self.limit {
            Some(limit) => tokio::time::timeout(limit, spawned)
                .await
                .map_err(|_| TaskError::Timeout(limit))?,
            None => spawned.await,
        };
        result.map_err(|e| {
            TaskError::ExecutionFailed(format!("cannot run '{}': {}", self.line, e))
        })
    }
}

#[async_trait]
impl Task for CommandTask {
    async fn execute(&self) -> Result<(), TaskError> {
        let output = self.output().await?;
        let code = output.status.code().unwrap_or(-1);

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(command = %self.line, "{}", line);
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        tracing::debug!(command = %self.line, exit_code = code, stderr = %stderr, "Command failed");
        Err(TaskError::CommandFailed { code, stderr })
    }

    fn description(&self) -> Option<&str> {
        Some(&self.line)
    }
}

/// Command description in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// `["program", "arg", ...]`
    Argv(Vec<String>),
    /// A table with the argument vector under `run`.
    Detailed {
        run: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<PathBuf>,
        /// Interval text such as `"5 minutes"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<String>,
    },
}

impl CommandSpec {
    pub fn argv(&self) -> &[String] {
        match self {
            CommandSpec::Argv(argv) => argv,
            CommandSpec::Detailed { run, .. } => run,
        }
    }

    /// Build the task for the agent `name`.
    pub fn to_task(&self, name: &str) -> Result<CommandTask, ConfigError> {
        let task = CommandTask::from_argv(self.argv())
            .ok_or_else(|| ConfigError::MissingField(format!("command of '{}'", name)))?;

        let CommandSpec::Detailed { env, dir, timeout, .. } = self else {
            return Ok(task);
        };

        let mut task = env
            .iter()
            .fold(task, |task, (key, value)| task.env(key.as_str(), value.as_str()));
        if let Some(dir) = dir {
            task = task.current_dir(dir);
        }
        if let Some(text) = timeout {
            let limit = TimeInterval::parse(text).map_err(|source| ConfigError::Schedule {
                name: name.to_string(),
                source,
            })?;
            task = task.time_limit(limit.as_duration());
        }
        Ok(task)
    }
}
