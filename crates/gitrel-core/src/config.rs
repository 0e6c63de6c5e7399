//! Facade configuration.

use serde::{Deserialize, Serialize};

/// Default notes namespace, shared with semantic-release.
pub const DEFAULT_NOTE_REF: &str = "semantic-release";

/// Settings shared by every facade operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitrelConfig {
    /// Notes namespace prefix. Versioned namespaces are `<prefix>-<ref>`.
    pub note_ref: String,
    /// Program invoked for every command (default: "git")
    pub git_bin: String,
    /// Remote whose URL `repo_url` reports (default: "origin")
    pub remote: String,
}

impl Default for GitrelConfig {
    fn default() -> Self {
        Self {
            note_ref: DEFAULT_NOTE_REF.to_string(),
            git_bin: "git".to_string(),
            remote: "origin".to_string(),
        }
    }
}

impl GitrelConfig {
    /// Build a configuration from `GITREL_*` environment variables, falling
    /// back to defaults for anything unset or empty.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: String| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(fallback)
        };

        Self {
            note_ref: read("GITREL_NOTE_REF", defaults.note_ref),
            git_bin: read("GITREL_GIT_BIN", defaults.git_bin),
            remote: read("GITREL_REMOTE", defaults.remote),
        }
    }

    /// Set a custom notes namespace prefix
    pub fn with_note_ref(mut self, note_ref: impl Into<String>) -> Self {
        self.note_ref = note_ref.into();
        self
    }

    /// Set a custom git program
    pub fn with_git_bin(mut self, git_bin: impl Into<String>) -> Self {
        self.git_bin = git_bin.into();
        self
    }

    /// Set the remote used for URL lookups
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Notes ref a note for `reference` is written to, e.g.
    /// `semantic-release-v1.0.0`.
    pub fn versioned_note_ref(&self, reference: &str) -> String {
        format!("{}-{}", self.note_ref, reference)
    }

    /// Glob covering the legacy and all versioned notes refs.
    pub fn notes_glob(&self) -> String {
        format!("refs/notes/{}*", self.note_ref)
    }
}
