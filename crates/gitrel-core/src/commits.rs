//! Commit range reading.

use chrono::{DateTime, FixedOffset};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{VcsError, VcsResult};
use crate::exec::ExecOptions;
use crate::git::Git;
use crate::log_stream::RawCommit;

/// A normalized commit, as consumed by release-decision logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full 40-hex commit hash
    pub sha: String,
    /// Trimmed commit message (subject and body)
    pub message: String,
    /// Trimmed raw decoration, e.g. `(tag: v1.0.0)`; empty when undecorated
    pub tags: String,
    pub committer_date: DateTime<FixedOffset>,
}

impl TryFrom<RawCommit> for CommitRecord {
    type Error = VcsError;

    fn try_from(raw: RawCommit) -> Result<Self, Self::Error> {
        let committer_date = DateTime::parse_from_rfc3339(&raw.committer_date).map_err(
            |source| VcsError::InvalidDate {
                value: raw.committer_date.clone(),
                source,
            },
        )?;

        Ok(CommitRecord {
            sha: raw.hash,
            message: raw.body.trim().to_string(),
            tags: raw.decoration.trim().to_string(),
            committer_date,
        })
    }
}

/// Revision range for `git log`: `<from>..<to>`, or all of `<to>`'s history.
pub fn commit_range(from: Option<&str>, to: &str) -> String {
    match from {
        Some(from) => format!("{from}..{to}"),
        None => to.to_string(),
    }
}

impl Git {
    /// Commits reachable from `to` but not from `from`, newest first.
    ///
    /// With `from = None` every ancestor of `to` (and `to` itself) is
    /// returned. The whole range is read before returning.
    #[instrument(skip(self, options), fields(cwd = ?options.cwd()))]
    pub async fn get_commits(
        &self,
        from: Option<&str>,
        to: &str,
        options: &ExecOptions,
    ) -> VcsResult<Vec<CommitRecord>> {
        let range = commit_range(from, to);
        let commits: Vec<CommitRecord> = self
            .log_stream()
            .records(&range, options)
            .await?
            .map(|raw| raw.and_then(CommitRecord::try_from))
            .try_collect()
            .await?;

        debug!(range = %range, count = commits.len(), "read commits");
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitrelConfig;
    use crate::fakes::ScriptedRunner;
    use crate::log_stream::LogRecordStream;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    const SHA_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const SHA_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn facade(stdout: &str) -> (Arc<ScriptedRunner>, Git) {
        let runner = Arc::new(ScriptedRunner::new());
        runner.succeed(["log"], stdout);
        let git = Git::with_runner(runner.clone(), GitrelConfig::default());
        (runner, git)
    }

    #[test]
    fn test_commit_range() {
        assert_eq!(commit_range(Some("abc"), "def"), "abc..def");
        assert_eq!(commit_range(None, "def"), "def");
    }

    #[test]
    fn test_normalization_trims_message_and_tags() {
        let record = CommitRecord::try_from(RawCommit {
            hash: SHA_A.to_string(),
            body: "\nfeat: thing\n\nBREAKING CHANGE: yes\n\n".to_string(),
            decoration: " (tag: v2.0.0) ".to_string(),
            committer_date: "2024-05-06T07:08:09+02:00".to_string(),
        })
        .unwrap();
        assert_eq!(record.message, "feat: thing\n\nBREAKING CHANGE: yes");
        assert_eq!(record.tags, "(tag: v2.0.0)");
        assert_eq!(record.committer_date.to_rfc3339(), "2024-05-06T07:08:09+02:00");
    }

    #[test]
    fn test_invalid_date_is_an_error() {
        let err = CommitRecord::try_from(RawCommit {
            hash: SHA_A.to_string(),
            body: "x".to_string(),
            decoration: String::new(),
            committer_date: "yesterday".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, VcsError::InvalidDate { .. }));
    }

    #[tokio::test]
    async fn test_get_commits_uses_exclusive_range() {
        let stdout = format!(
            "{SHA_B}\0fix: b\n\0 (HEAD -> main)\02024-01-02T00:00:00Z\0"
        );
        let (runner, git) = facade(&stdout);

        let commits = git
            .get_commits(Some(SHA_A), SHA_B, &ExecOptions::new("."))
            .await
            .unwrap();

        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, SHA_B);
        assert_eq!(commits[0].message, "fix: b");
        assert_eq!(commits[0].tags, "(HEAD -> main)");

        let log = runner.invocations("log");
        assert!(log[0].contains(&format!("{SHA_A}..{SHA_B}")));
    }

    #[tokio::test]
    async fn test_get_commits_without_from_reads_full_history() {
        let (runner, git) = facade("");
        let commits = git
            .get_commits(None, "HEAD", &ExecOptions::new("."))
            .await
            .unwrap();
        assert!(commits.is_empty());
        assert!(runner.invocations("log")[0].contains(&"HEAD".to_string()));
    }

    #[tokio::test]
    async fn test_get_commits_propagates_log_failure() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.fail(["log"], 128, "fatal: bad revision 'nope'");
        let git = Git::with_runner(runner, GitrelConfig::default());
        let err = git
            .get_commits(None, "nope", &ExecOptions::new("."))
            .await
            .unwrap_err();
        assert_eq!(err.stderr(), Some("fatal: bad revision 'nope'"));
    }

    /// Serves fixed records and remembers what it was asked for.
    struct FixedLog {
        records: Vec<RawCommit>,
        requests: Mutex<Vec<(String, PathBuf)>>,
    }

    #[async_trait]
    impl LogRecordStream for FixedLog {
        async fn records(
            &self,
            range: &str,
            options: &ExecOptions,
        ) -> VcsResult<BoxStream<'static, VcsResult<RawCommit>>> {
            self.requests
                .lock()
                .unwrap()
                .push((range.to_string(), options.cwd().to_path_buf()));
            Ok(stream::iter(self.records.clone().into_iter().map(Ok)).boxed())
        }
    }

    #[tokio::test]
    async fn test_get_commits_reads_injected_log_stream() {
        let log = Arc::new(FixedLog {
            records: vec![RawCommit {
                hash: SHA_B.to_string(),
                body: "feat: injected\n".to_string(),
                decoration: " (tag: v1.1.0) ".to_string(),
                committer_date: "2024-03-04T05:06:07-05:00".to_string(),
            }],
            requests: Mutex::new(Vec::new()),
        });
        let runner = Arc::new(ScriptedRunner::new());
        let git = Git::with_runner(runner.clone(), GitrelConfig::default())
            .with_log_stream(log.clone());

        let commits = git
            .get_commits(Some(SHA_A), "HEAD", &ExecOptions::new("/work/repo"))
            .await
            .unwrap();

        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "feat: injected");
        assert_eq!(commits[0].tags, "(tag: v1.1.0)");
        assert_eq!(commits[0].committer_date.offset().local_minus_utc(), -5 * 3600);

        let requests = log.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![(format!("{SHA_A}..HEAD"), PathBuf::from("/work/repo"))]
        );
        assert!(runner.calls().is_empty());
    }
}
