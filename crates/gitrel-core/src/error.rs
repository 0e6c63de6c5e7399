//! Error taxonomy for git facade operations.

/// Errors produced by git invocations and output parsing.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("malformed log record: {0}")]
    MalformedRecord(String),

    #[error("invalid committer date {value:?}: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VcsError {
    /// Exit code of the failed command, if the error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            VcsError::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured stderr of the failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            VcsError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Result type for git facade operations.
pub type VcsResult<T> = std::result::Result<T, VcsError>;
