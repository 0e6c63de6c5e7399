//! Shallow-clone-aware synchronization with a remote.
//!
//! CI checkouts are often shallow and detached at a pinned commit. Fetching
//! has to deepen history and refresh tags without moving the branch the CI
//! job has checked out:
//!
//! ```text
//! AttemptUnshallow --ok--> Done
//!        |
//!      error
//!        v
//!  AttemptPlain --ok--> Done
//!        |
//!      error --> Fail (branch fetch) | Ignore (notes fetch)
//! ```

use tracing::{debug, info, instrument};

use crate::error::VcsResult;
use crate::exec::ExecOptions;
use crate::git::{Git, Probe};

const NOTES_REFSPEC: &str = "+refs/notes/*:refs/notes/*";

/// Stage of the two-attempt fetch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttempt {
    /// Convert a shallow clone to a full one while fetching.
    Unshallow,
    /// Plain fetch; used when `--unshallow` is rejected (e.g. full clone).
    Plain,
}

impl FetchAttempt {
    /// Next attempt after a failure, if any.
    pub fn degrade(self) -> Option<FetchAttempt> {
        match self {
            FetchAttempt::Unshallow => Some(FetchAttempt::Plain),
            FetchAttempt::Plain => None,
        }
    }

    fn flag(self) -> Option<&'static str> {
        match self {
            FetchAttempt::Unshallow => Some("--unshallow"),
            FetchAttempt::Plain => None,
        }
    }
}

/// How a synchronization finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The unshallow attempt succeeded.
    Unshallowed,
    /// Only the plain attempt succeeded.
    Fetched,
    /// Both attempts failed and the failure was ignored.
    Skipped,
}

/// Refspec strategy for one `synchronize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// The branch being released is the branch that triggered CI
    pub on_trigger_branch: bool,
    /// HEAD is detached
    pub detached: bool,
}

impl FetchPlan {
    pub fn new(target_branch: &str, ci_trigger_branch: &str, detached: bool) -> Self {
        Self {
            on_trigger_branch: target_branch == ci_trigger_branch,
            detached,
        }
    }

    /// Fetch without a refspec so the checked-out branch is left where CI put
    /// it. Only safe when that branch is the one being released and attached.
    pub fn preserves_checkout(&self) -> bool {
        self.on_trigger_branch && !self.detached
    }

    /// `git fetch` arguments for `attempt`.
    pub fn fetch_args(&self, remote_url: &str, branch: &str, attempt: FetchAttempt) -> Vec<String> {
        let mut args = vec!["fetch".to_string()];
        args.extend(attempt.flag().map(str::to_string));
        args.push("--tags".to_string());

        if self.preserves_checkout() {
            args.push(remote_url.to_string());
        } else {
            args.push("--update-head-ok".to_string());
            args.push(remote_url.to_string());
            args.push(format!("+refs/heads/{branch}:refs/heads/{branch}"));
        }
        args
    }
}

/// `git fetch` arguments for the notes refs.
pub fn notes_fetch_args(remote_url: &str, attempt: FetchAttempt) -> Vec<String> {
    let mut args = vec!["fetch".to_string()];
    args.extend(attempt.flag().map(str::to_string));
    args.push(remote_url.to_string());
    args.push(NOTES_REFSPEC.to_string());
    args
}

impl Git {
    /// Whether HEAD is detached.
    ///
    /// Detached means `rev-parse --abbrev-ref HEAD` printed the literal
    /// `HEAD`. A failed query is `Indeterminate` and never an error.
    pub async fn head_detached(&self, options: &ExecOptions) -> Probe {
        match self
            .exec_unchecked(["rev-parse", "--abbrev-ref", "HEAD"], options)
            .await
        {
            Ok(output) if output.success() => {
                if output.stdout.trim() == "HEAD" {
                    Probe::Yes
                } else {
                    Probe::No
                }
            }
            Ok(output) => {
                debug!(
                    exit_code = output.exit_code,
                    stderr = %output.stderr.trim(),
                    "could not resolve HEAD, assuming attached"
                );
                Probe::Indeterminate
            }
            Err(e) => {
                debug!(error = %e, "could not resolve HEAD, assuming attached");
                Probe::Indeterminate
            }
        }
    }

    /// Fetch full history and tags for `branch` from `remote_url`.
    ///
    /// On the CI trigger branch with an attached HEAD no refspec is passed,
    /// so the commit CI checked out is not moved. Otherwise the branch is
    /// force-updated with `+refs/heads/<branch>:refs/heads/<branch>` and
    /// `--update-head-ok`. Fails only if both attempts fail.
    // Remote URLs may embed credentials; keep them out of spans.
    #[instrument(skip(self, remote_url, options), fields(cwd = ?options.cwd))]
    pub async fn synchronize(
        &self,
        remote_url: &str,
        branch: &str,
        ci_trigger_branch: &str,
        options: &ExecOptions,
    ) -> VcsResult<SyncOutcome> {
        let detached = self.head_detached(options).await.is_yes();
        let plan = FetchPlan::new(branch, ci_trigger_branch, detached);
        debug!(?plan, "fetch plan");

        self.run_degrading(|attempt| plan.fetch_args(remote_url, branch, attempt), options)
            .await
    }

    /// Fetch every notes ref from `remote_url`. Never fails: missing notes
    /// must not abort a release, so a second failure yields
    /// [`SyncOutcome::Skipped`].
    #[instrument(skip(self, remote_url, options), fields(cwd = ?options.cwd))]
    pub async fn synchronize_notes(&self, remote_url: &str, options: &ExecOptions) -> SyncOutcome {
        self.run_degrading(|attempt| notes_fetch_args(remote_url, attempt), options)
            .await
            .unwrap_or_else(|err| {
                debug!(error = %err, "notes fetch failed, continuing without notes");
                SyncOutcome::Skipped
            })
    }

    /// Run the unshallow attempt, then the plain one. The error of the last
    /// attempt is returned for the caller to propagate or ignore.
    async fn run_degrading<F>(&self, args_for: F, options: &ExecOptions) -> VcsResult<SyncOutcome>
    where
        F: Fn(FetchAttempt) -> Vec<String>,
    {
        let mut attempt = FetchAttempt::Unshallow;
        loop {
            match self.exec(args_for(attempt), options).await {
                Ok(_) => {
                    let outcome = match attempt {
                        FetchAttempt::Unshallow => SyncOutcome::Unshallowed,
                        FetchAttempt::Plain => SyncOutcome::Fetched,
                    };
                    info!(?outcome, "fetch complete");
                    return Ok(outcome);
                }
                Err(err) => match attempt.degrade() {
                    Some(next) => {
                        debug!(error = %err, "fetch with {:?} failed, retrying as {:?}", attempt, next);
                        attempt = next;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}
