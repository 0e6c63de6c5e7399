//! The git facade: shared plumbing for every operation.
//!
//! Operations live in sibling modules as `impl Git` blocks:
//! - `sync`: fetch/unshallow and notes synchronization
//! - `notes`: tag-notes extraction and single-ref note read/write
//! - `commits`: commit range reading
//! - `refs`: tag/branch/ref point queries and publishing

use std::sync::Arc;

use tracing::debug;

use crate::config::GitrelConfig;
use crate::error::VcsResult;
use crate::exec::{CommandOutput, CommandRequest, CommandRunner, ExecOptions, TokioCommandRunner};
use crate::log_stream::{GitLogStream, LogRecordStream};

/// Outcome of a best-effort boolean query.
///
/// Probes never fail: a query that could not be answered is
/// `Indeterminate`, which callers treat as false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Yes,
    No,
    Indeterminate,
}

impl Probe {
    /// True only for a definite `Yes`.
    pub fn is_yes(self) -> bool {
        matches!(self, Probe::Yes)
    }

    /// Classify a finished command by exit code: 0 is `Yes`, 1..=128 `No`.
    /// Signals (-1) and out-of-range codes are `Indeterminate`.
    pub fn from_exit_code(exit_code: i32) -> Self {
        match exit_code {
            0 => Probe::Yes,
            1..=128 => Probe::No,
            _ => Probe::Indeterminate,
        }
    }
}

impl From<Probe> for bool {
    fn from(probe: Probe) -> bool {
        probe.is_yes()
    }
}

/// Facade over the git command line.
///
/// Cheap to clone and `Send + Sync`. Holds no repository state: the working
/// directory is supplied per call through [`ExecOptions`], and callers must
/// serialize mutating operations on the same directory.
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    log: Arc<dyn LogRecordStream>,
    config: GitrelConfig,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("config", &self.config).finish()
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new(GitrelConfig::default())
    }
}

impl Git {
    /// Facade spawning real `git` processes.
    pub fn new(config: GitrelConfig) -> Self {
        Self::with_runner(Arc::new(TokioCommandRunner), config)
    }

    /// Facade over a custom runner; the log stream shares it.
    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: GitrelConfig) -> Self {
        let log = Arc::new(GitLogStream::new(runner.clone(), config.git_bin.clone()));
        Self {
            runner,
            log,
            config,
        }
    }

    /// Replace the log record stream.
    pub fn with_log_stream(mut self, log: Arc<dyn LogRecordStream>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &GitrelConfig {
        &self.config
    }

    pub(crate) fn log_stream(&self) -> &dyn LogRecordStream {
        self.log.as_ref()
    }

    pub(crate) fn request<I, S>(&self, args: I, options: &ExecOptions) -> CommandRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandRequest::new(self.config.git_bin.clone(), args, options)
    }

    /// Run a git command, failing on non-zero exit.
    pub(crate) async fn exec<I, S>(&self, args: I, options: &ExecOptions) -> VcsResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&self.request(args, options)).await
    }

    /// Run a git command and return its exit status instead of failing.
    pub(crate) async fn exec_unchecked<I, S>(
        &self,
        args: I,
        options: &ExecOptions,
    ) -> VcsResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner
            .run(&self.request(args, options).allow_failure())
            .await
    }

    /// Run a git command as a yes/no question. Never fails.
    pub(crate) async fn probe<I, S>(&self, args: I, options: &ExecOptions) -> Probe
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = self.request(args, options).allow_failure();
        match self.runner.run(&request).await {
            Ok(output) => {
                let probe = Probe::from_exit_code(output.exit_code);
                if !probe.is_yes() {
                    debug!(
                        command = %request.command_line(),
                        exit_code = output.exit_code,
                        stderr = %output.stderr.trim(),
                        "probe answered {:?}",
                        probe
                    );
                }
                probe
            }
            Err(e) => {
                debug!(command = %request.command_line(), error = %e, "probe could not run");
                Probe::Indeterminate
            }
        }
    }
}
