//! Log record stream: raw commit records for a revision range.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{VcsError, VcsResult};
use crate::exec::{CommandRequest, CommandRunner, ExecOptions};

const NUL: char = '\0';
const FIELDS_PER_RECORD: usize = 4;

/// `git log -z` format: hash, raw body, decoration, strict ISO committer date.
///
/// Fields and records are both NUL-terminated. Commit messages cannot contain
/// NUL, so every other byte in a body is carried through untouched.
pub const LOG_FORMAT: &str = "%H%x00%B%x00%d%x00%cI";

/// A commit as read from `git log`, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub hash: String,
    pub body: String,
    pub decoration: String,
    pub committer_date: String,
}

/// Produces commit records for a revision range, newest first.
#[async_trait]
pub trait LogRecordStream: Send + Sync {
    /// Start reading `range`. The returned stream is finite and yields each
    /// record once; a malformed record is yielded as an error.
    async fn records(
        &self,
        range: &str,
        options: &ExecOptions,
    ) -> VcsResult<BoxStream<'static, VcsResult<RawCommit>>>;
}

/// `LogRecordStream` backed by a single `git log` invocation.
pub struct GitLogStream {
    runner: Arc<dyn CommandRunner>,
    git_bin: String,
}

impl GitLogStream {
    pub fn new(runner: Arc<dyn CommandRunner>, git_bin: impl Into<String>) -> Self {
        Self {
            runner,
            git_bin: git_bin.into(),
        }
    }
}

#[async_trait]
impl LogRecordStream for GitLogStream {
    async fn records(
        &self,
        range: &str,
        options: &ExecOptions,
    ) -> VcsResult<BoxStream<'static, VcsResult<RawCommit>>> {
        let format = format!("--format={LOG_FORMAT}");
        let request = CommandRequest::new(
            self.git_bin.clone(),
            ["log", "-z", format.as_str(), range, "--"],
            options,
        );
        let output = self.runner.run(&request).await?;

        let mut fields: Vec<String> = output.stdout.split(NUL).map(str::to_string).collect();
        // Final terminator; a committer date is never empty.
        if fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        if fields.len() % FIELDS_PER_RECORD != 0 {
            return Err(VcsError::MalformedRecord(format!(
                "{} fields is not a whole number of records",
                fields.len()
            )));
        }

        let records: Vec<Vec<String>> = fields
            .chunks(FIELDS_PER_RECORD)
            .map(<[String]>::to_vec)
            .collect();

        Ok(stream::iter(records)
            .map(|record| {
                let fields: Vec<&str> = record.iter().map(String::as_str).collect();
                parse_record(&fields)
            })
            .boxed())
    }
}

/// Build a raw commit from the four fields of one record.
pub fn parse_record(fields: &[&str]) -> VcsResult<RawCommit> {
    let &[hash, body, decoration, committer_date] = fields else {
        return Err(VcsError::MalformedRecord(format!(
            "expected {FIELDS_PER_RECORD} fields, got {}",
            fields.len()
        )));
    };

    let hash = hash.trim();
    if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(VcsError::MalformedRecord(format!("invalid hash {hash:?}")));
    }

    Ok(RawCommit {
        hash: hash.to_string(),
        body: body.to_string(),
        decoration: decoration.to_string(),
        committer_date: committer_date.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use futures::TryStreamExt;

    const SHA_A: &str = "1111111111111111111111111111111111111111";
    const SHA_B: &str = "2222222222222222222222222222222222222222";

    fn record(hash: &str, body: &str, decoration: &str, date: &str) -> String {
        format!("{hash}\0{body}\0{decoration}\0{date}\0")
    }

    async fn read_all(stdout: &str) -> VcsResult<Vec<RawCommit>> {
        let runner = Arc::new(ScriptedRunner::new());
        runner.succeed(["log"], stdout);
        GitLogStream::new(runner, "git")
            .records("HEAD", &ExecOptions::new("."))
            .await?
            .try_collect()
            .await
    }

    #[test]
    fn test_parse_record_fields() {
        let raw = parse_record(&[
            SHA_A,
            "feat: add thing\n\nbody\n",
            " (HEAD -> main, tag: v1.0.0)",
            "2024-01-02T03:04:05+00:00",
        ])
        .unwrap();
        assert_eq!(raw.hash, SHA_A);
        assert_eq!(raw.body, "feat: add thing\n\nbody\n");
        assert_eq!(raw.decoration, " (HEAD -> main, tag: v1.0.0)");
        assert_eq!(raw.committer_date, "2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_parse_record_rejects_missing_fields() {
        let err = parse_record(&[SHA_A, "msg"]).unwrap_err();
        assert!(matches!(err, VcsError::MalformedRecord(_)));
    }

    #[test]
    fn test_parse_record_rejects_bad_hash() {
        let err = parse_record(&["nothex", "m", "", "2024-01-01T00:00:00Z"]).unwrap_err();
        assert!(matches!(err, VcsError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_git_log_stream_yields_records_in_order() {
        let runner = Arc::new(ScriptedRunner::new());
        let stdout = record(SHA_B, "fix: second\n", " (tag: v1.0.1)", "2024-01-02T00:00:00Z")
            + &record(SHA_A, "feat: first\n", "", "2024-01-01T00:00:00Z");
        runner.succeed(["log"], &stdout);

        let stream = GitLogStream::new(runner.clone(), "git");
        let records: Vec<RawCommit> = stream
            .records("HEAD", &ExecOptions::new("."))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash, SHA_B);
        assert_eq!(records[1].hash, SHA_A);
        assert_eq!(records[1].decoration, "");

        let format_arg = format!("--format={LOG_FORMAT}");
        let calls = runner.invocations("log");
        assert_eq!(calls[0], vec!["log", "-z", format_arg.as_str(), "HEAD", "--"]);
    }

    #[tokio::test]
    async fn test_control_bytes_in_body_are_preserved() {
        let body = "feat: a\u{1e}b\n\nfix: x\u{1f}y\n";
        let stdout = record(SHA_A, body, "", "2024-01-01T00:00:00Z");
        let records = read_all(&stdout).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, body);
    }

    #[tokio::test]
    async fn test_missing_final_terminator_is_accepted() {
        let stdout = format!("{SHA_A}\0feat: x\n\0\02024-01-01T00:00:00Z");
        let records = read_all(&stdout).await.unwrap();
        assert_eq!(records[0].committer_date, "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_truncated_output_is_an_error() {
        let stdout = format!("{SHA_A}\0feat: x\n\0");
        let err = read_all(&stdout).await.unwrap_err();
        assert!(matches!(err, VcsError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_git_log_stream_empty_output() {
        assert!(read_all("").await.unwrap().is_empty());
    }
}
