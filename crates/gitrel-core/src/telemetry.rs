//! Tracing setup for the `gitrel` binary.
//!
//! The library only emits events; [`init_tracing`] installs the global
//! subscriber. Only the first call in a process takes effect.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets whose events follow the requested level.
const GITREL_TARGETS: &[&str] = &["gitrel_core", "gitrel"];

/// Filter used when `RUST_LOG` is unset: gitrel at `level`, dependencies
/// only at `warn`.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(GITREL_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install a subscriber filtered by `RUST_LOG`, or by
/// [`default_directives`] when unset.
///
/// Events go to stderr: stdout carries command results (SHAs, JSON notes)
/// that CI scripts capture. With `json` set, each event is one JSON object
/// per line and carries the active span list, so the `cwd` recorded on each
/// operation's span shows up next to its events.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_list(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}
