//! Command execution seam.
//!
//! Every git invocation goes through a [`CommandRunner`]. Production code uses
//! [`TokioCommandRunner`]; tests script responses with
//! [`crate::fakes::ScriptedRunner`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::trace;

use crate::error::{VcsError, VcsResult};

/// Working directory and environment shared by a sequence of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOptions {
    /// Directory the command runs in (the checked-out repository)
    pub cwd: PathBuf,
    /// Environment variables added on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl ExecOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    /// Add an environment override
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Fail with [`VcsError::CommandFailed`] on a non-zero exit
    pub reject: bool,
}

impl CommandRequest {
    pub fn new<I, S>(program: impl Into<String>, args: I, options: &ExecOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: options.cwd.clone(),
            env: options.env.clone(),
            reject: true,
        }
    }

    /// Return the exit status instead of failing on a non-zero exit.
    pub fn allow_failure(mut self) -> Self {
        self.reject = false;
        self
    }

    /// Human-readable command line, used in errors and logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Turn a non-zero exit into an error, regardless of `reject`.
    pub fn check(&self, output: CommandOutput) -> VcsResult<CommandOutput> {
        if output.success() {
            Ok(output)
        } else {
            Err(VcsError::CommandFailed {
                command: self.command_line(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when terminated by a signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external commands.
///
/// Implementations must honour `request.reject`: when set, a non-zero exit is
/// reported as [`VcsError::CommandFailed`] carrying the captured stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &CommandRequest) -> VcsResult<CommandOutput>;
}

/// Runs commands as child processes on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> VcsResult<CommandOutput> {
        trace!(command = %request.command_line(), cwd = ?request.cwd, "spawning");

        let output = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| VcsError::Spawn {
                program: request.program.clone(),
                source,
            })?;

        let captured = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if request.reject {
            request.check(captured)
        } else {
            Ok(captured)
        }
    }
}
