//! gitrel core library
//!
//! A facade over the `git` command line for release automation: fetching
//! full history on shallow CI checkouts, reading commit ranges, reading and
//! writing JSON release notes attached to tags, and publishing tags/notes.
//!
//! ## Key Components
//!
//! - [`Git`]: the facade; every operation takes the working directory via
//!   [`ExecOptions`]
//! - [`CommandRunner`]: seam for spawning git ([`TokioCommandRunner`] in
//!   production, [`fakes::ScriptedRunner`] in tests)
//! - [`LogRecordStream`]: seam for reading `git log` records
//!
//! The facade performs no locking. Callers serialize mutating operations on a
//! working directory (synchronize, then read, then tag, then push).

pub mod commits;
pub mod config;
pub mod error;
pub mod exec;
pub mod fakes;
pub mod git;
pub mod log_stream;
pub mod notes;
pub mod refs;
pub mod sync;
pub mod telemetry;

pub use commits::{commit_range, CommitRecord};
pub use config::{GitrelConfig, DEFAULT_NOTE_REF};
pub use error::{VcsError, VcsResult};
pub use exec::{CommandOutput, CommandRequest, CommandRunner, ExecOptions, TokioCommandRunner};
pub use git::{Git, Probe};
pub use log_stream::{GitLogStream, LogRecordStream, RawCommit};
pub use notes::{parse_decoration, parse_tags_notes, TagNotesMap};
pub use sync::{FetchAttempt, FetchPlan, SyncOutcome};
pub use telemetry::init_tracing;

/// gitrel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
