//! Tag, branch and ref point queries, plus publishing.
//!
//! Each operation is a single git invocation. Fatal operations return the
//! command's error with stderr preserved; probes return [`Probe`] and
//! lookups that may legitimately come up empty return `Option`.

use tracing::{debug, instrument};

use crate::error::{VcsError, VcsResult};
use crate::exec::ExecOptions;
use crate::git::{Git, Probe};

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Branch names from `git ls-remote --heads` output.
pub fn parse_remote_heads(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once("refs/heads/"))
        .map(|(_, branch)| branch.trim().to_string())
        .filter(|branch| !branch.is_empty())
        .collect()
}

impl Git {
    /// Commit a tag points to.
    pub async fn get_tag_head(&self, tag: &str, options: &ExecOptions) -> VcsResult<String> {
        let output = self.exec(["rev-list", "-1", tag], options).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Tags reachable from `branch`.
    pub async fn get_tags(&self, branch: &str, options: &ExecOptions) -> VcsResult<Vec<String>> {
        let output = self.exec(["tag", "--merged", branch], options).await?;
        Ok(non_empty_lines(&output.stdout))
    }

    /// Branch names on the remote.
    #[instrument(skip(self, remote_url, options))]
    pub async fn get_branches(
        &self,
        remote_url: &str,
        options: &ExecOptions,
    ) -> VcsResult<Vec<String>> {
        let output = self.exec(["ls-remote", "--heads", remote_url], options).await?;
        Ok(parse_remote_heads(&output.stdout))
    }

    /// Whether `reference` resolves to an object. Never fails.
    pub async fn is_ref_exists(&self, reference: &str, options: &ExecOptions) -> Probe {
        self.probe(["rev-parse", "--verify", reference], options).await
    }

    /// Check push permission on `branch` with a dry-run push.
    #[instrument(skip(self, remote_url, options))]
    pub async fn verify_auth(
        &self,
        remote_url: &str,
        branch: &str,
        options: &ExecOptions,
    ) -> VcsResult<()> {
        let refspec = format!("HEAD:{branch}");
        self.exec(
            ["push", "--dry-run", "--no-verify", remote_url, refspec.as_str()],
            options,
        )
        .await
        .map_err(|e| {
            debug!(error = %e, "push authorization check failed");
            e
        })?;
        Ok(())
    }

    /// Create a lightweight tag `tag_name` at `reference`.
    pub async fn tag(
        &self,
        tag_name: &str,
        reference: &str,
        options: &ExecOptions,
    ) -> VcsResult<()> {
        self.exec(["tag", tag_name, reference], options).await?;
        Ok(())
    }

    /// Push all local tags.
    #[instrument(skip(self, remote_url, options))]
    pub async fn push(&self, remote_url: &str, options: &ExecOptions) -> VcsResult<()> {
        self.exec(["push", "--tags", remote_url], options).await?;
        Ok(())
    }

    /// Push the notes ref holding the note for `reference`.
    #[instrument(skip(self, remote_url, options))]
    pub async fn push_notes(
        &self,
        remote_url: &str,
        reference: &str,
        options: &ExecOptions,
    ) -> VcsResult<()> {
        let notes_ref = format!("refs/notes/{}", self.config().versioned_note_ref(reference));
        self.exec(["push", remote_url, notes_ref.as_str()], options)
            .await?;
        Ok(())
    }

    /// Whether `tag_name` is a valid tag name. Never fails.
    pub async fn verify_tag_name(&self, tag_name: &str, options: &ExecOptions) -> Probe {
        let reference = format!("refs/tags/{tag_name}");
        self.probe(["check-ref-format", reference.as_str()], options)
            .await
    }

    /// Whether `branch` is a valid branch name. Never fails.
    pub async fn verify_branch_name(&self, branch: &str, options: &ExecOptions) -> Probe {
        let reference = format!("refs/heads/{branch}");
        self.probe(["check-ref-format", reference.as_str()], options)
            .await
    }

    /// Whether the remote head of `branch` is the local HEAD commit.
    #[instrument(skip(self, remote_url, options))]
    pub async fn is_branch_up_to_date(
        &self,
        remote_url: &str,
        branch: &str,
        options: &ExecOptions,
    ) -> VcsResult<bool> {
        let head = self.get_git_head(options).await?;
        let output = self
            .exec(["ls-remote", "--heads", remote_url, branch], options)
            .await?;

        let remote_head = output
            .stdout
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next());

        debug!(local = %head, remote = ?remote_head, "comparing branch heads");
        Ok(remote_head == Some(head.as_str()))
    }

    /// SHA of HEAD.
    pub async fn get_git_head(&self, options: &ExecOptions) -> VcsResult<String> {
        let output = self.exec(["rev-parse", "HEAD"], options).await?;
        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(VcsError::UnexpectedOutput {
                command: "git rev-parse HEAD".to_string(),
                output: output.stdout,
            });
        }
        Ok(sha)
    }

    /// URL of the configured remote, if any. Never fails.
    pub async fn repo_url(&self, options: &ExecOptions) -> Option<String> {
        let key = format!("remote.{}.url", self.config().remote);
        match self.exec(["config", "--get", key.as_str()], options).await {
            Ok(output) => Some(output.stdout.trim().to_string()).filter(|url| !url.is_empty()),
            Err(e) => {
                debug!(error = %e, "no remote URL configured");
                None
            }
        }
    }

    /// Whether the working directory is inside a git repository. Never fails.
    pub async fn is_git_repo(&self, options: &ExecOptions) -> Probe {
        self.probe(["rev-parse", "--git-dir"], options).await
    }

    /// Object id `refs/tags/<tag>` points to, if the tag exists. Never fails.
    pub async fn get_tag_ref(&self, tag: &str, options: &ExecOptions) -> Option<String> {
        let reference = format!("refs/tags/{tag}");
        match self
            .exec(["show-ref", "--hash", reference.as_str()], options)
            .await
        {
            Ok(output) => output
                .stdout
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            Err(e) => {
                debug!(tag = %tag, error = %e, "tag ref not found");
                None
            }
        }
    }
}
