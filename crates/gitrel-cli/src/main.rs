//! gitrel - git facade for release automation
//!
//! The `gitrel` command exposes each repository operation to CI scripts.
//!
//! ## Commands
//!
//! - `sync` / `sync-notes`: fetch full history, tags and notes
//! - `commits`: list commits in a range as JSON
//! - `tags-notes` / `add-note` / `get-note`: read and write tag release notes
//! - `tag` / `push` / `push-notes`: publish a release
//!
//! Probe commands (`ref-exists`, `is-repo`, `verify-tag-name`, ...) print
//! `yes`, `no` or `unknown` and exit non-zero unless the answer is `yes`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, Level};

use gitrel_core::{init_tracing, ExecOptions, Git, GitrelConfig, Probe, SyncOutcome};

#[derive(Parser)]
#[command(name = "gitrel")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Git facade for release automation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Repository working directory
    #[arg(long, global = true, env = "GITREL_CWD", default_value = ".")]
    cwd: PathBuf,

    /// Notes ref prefix (overrides GITREL_NOTE_REF)
    #[arg(long, global = true)]
    note_ref: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch full history and tags from the remote
    Sync {
        /// Remote repository URL
        remote_url: String,

        /// Release branch
        branch: String,

        /// Branch the CI job was triggered for (default: the release branch)
        #[arg(long, env = "GITREL_CI_BRANCH")]
        ci_branch: Option<String>,
    },

    /// Fetch all notes refs from the remote; failures are ignored
    SyncNotes {
        /// Remote repository URL
        remote_url: String,
    },

    /// List commits reachable from `to` but not from `from`, as JSON
    Commits {
        /// Exclusive lower bound (default: full history)
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper bound
        #[arg(long, default_value = "HEAD")]
        to: String,
    },

    /// Print the note of every tagged commit, keyed by tag name
    TagsNotes,

    /// Print the commit a tag points to
    TagHead { tag: String },

    /// List tags reachable from a branch
    Tags { branch: String },

    /// List branch names on the remote
    Branches { remote_url: String },

    /// Check whether a ref resolves
    RefExists { reference: String },

    /// Check push permission with a dry-run push
    VerifyAuth { remote_url: String, branch: String },

    /// Create a lightweight tag
    Tag {
        name: String,

        #[arg(default_value = "HEAD")]
        reference: String,
    },

    /// Push all local tags
    Push { remote_url: String },

    /// Push the notes ref for a tag
    PushNotes {
        remote_url: String,
        reference: String,
    },

    /// Attach a JSON note to a ref, replacing any existing note
    AddNote {
        reference: String,

        /// Note content; must be valid JSON
        note: String,
    },

    /// Print the note attached to a ref
    GetNote { reference: String },

    /// Check a tag name against git's ref naming rules
    VerifyTagName { name: String },

    /// Check a branch name against git's ref naming rules
    VerifyBranchName { name: String },

    /// Check whether the remote branch head is the local HEAD
    UpToDate { remote_url: String, branch: String },

    /// Print the HEAD commit
    Head,

    /// Print the configured remote URL
    RepoUrl,

    /// Check whether the working directory is a git repository
    IsRepo,

    /// Print the object id of a tag ref
    TagRef { tag: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let mut config = GitrelConfig::from_env();
    if let Some(note_ref) = cli.note_ref {
        config = config.with_note_ref(note_ref);
    }
    debug!(?config, cwd = ?cli.cwd, "starting");

    let git = Git::new(config);
    let opts = ExecOptions::new(cli.cwd);

    run(&git, cli.command, &opts).await
}

async fn run(git: &Git, command: Commands, opts: &ExecOptions) -> Result<ExitCode> {
    match command {
        Commands::Sync {
            remote_url,
            branch,
            ci_branch,
        } => {
            let trigger = ci_branch.as_deref().unwrap_or(&branch);
            let outcome = git
                .synchronize(&remote_url, &branch, trigger, opts)
                .await
                .context("Failed to synchronize with remote")?;
            println!("{}", outcome_label(outcome));
        }
        Commands::SyncNotes { remote_url } => {
            let outcome = git.synchronize_notes(&remote_url, opts).await;
            println!("{}", outcome_label(outcome));
        }
        Commands::Commits { from, to } => {
            let commits = git
                .get_commits(from.as_deref(), &to, opts)
                .await
                .with_context(|| format!("Failed to read commits up to '{}'", to))?;
            print_json(&commits)?;
        }
        Commands::TagsNotes => {
            let notes = git
                .get_tags_notes(opts)
                .await
                .context("Failed to read tag notes")?;
            print_json(&notes)?;
        }
        Commands::TagHead { tag } => {
            let sha = git
                .get_tag_head(&tag, opts)
                .await
                .with_context(|| format!("Failed to resolve tag '{}'", tag))?;
            println!("{}", sha);
        }
        Commands::Tags { branch } => {
            for tag in git.get_tags(&branch, opts).await? {
                println!("{}", tag);
            }
        }
        Commands::Branches { remote_url } => {
            for branch in git.get_branches(&remote_url, opts).await? {
                println!("{}", branch);
            }
        }
        Commands::RefExists { reference } => {
            return Ok(report_probe(git.is_ref_exists(&reference, opts).await));
        }
        Commands::VerifyAuth { remote_url, branch } => {
            git.verify_auth(&remote_url, &branch, opts)
                .await
                .with_context(|| format!("No push permission on branch '{}'", branch))?;
            println!("ok");
        }
        Commands::Tag { name, reference } => {
            git.tag(&name, &reference, opts)
                .await
                .with_context(|| format!("Failed to create tag '{}'", name))?;
            println!("Created tag {} at {}", name, reference);
        }
        Commands::Push { remote_url } => {
            git.push(&remote_url, opts)
                .await
                .context("Failed to push tags")?;
            println!("Pushed tags");
        }
        Commands::PushNotes {
            remote_url,
            reference,
        } => {
            git.push_notes(&remote_url, &reference, opts)
                .await
                .with_context(|| format!("Failed to push notes for '{}'", reference))?;
            println!("Pushed notes for {}", reference);
        }
        Commands::AddNote { reference, note } => {
            let note: Value = serde_json::from_str(&note).context("Note is not valid JSON")?;
            git.add_note(&note, &reference, opts)
                .await
                .with_context(|| format!("Failed to add note to '{}'", reference))?;
            println!("Added note to {}", reference);
        }
        Commands::GetNote { reference } => {
            let note = git
                .get_note(&reference, opts)
                .await
                .with_context(|| format!("Failed to read note for '{}'", reference))?;
            print_json(&note)?;
        }
        Commands::VerifyTagName { name } => {
            return Ok(report_probe(git.verify_tag_name(&name, opts).await));
        }
        Commands::VerifyBranchName { name } => {
            return Ok(report_probe(git.verify_branch_name(&name, opts).await));
        }
        Commands::UpToDate { remote_url, branch } => {
            let up_to_date = git.is_branch_up_to_date(&remote_url, &branch, opts).await?;
            let probe = if up_to_date { Probe::Yes } else { Probe::No };
            return Ok(report_probe(probe));
        }
        Commands::Head => {
            println!("{}", git.get_git_head(opts).await?);
        }
        Commands::RepoUrl => match git.repo_url(opts).await {
            Some(url) => println!("{}", url),
            None => return Ok(ExitCode::FAILURE),
        },
        Commands::IsRepo => {
            return Ok(report_probe(git.is_git_repo(opts).await));
        }
        Commands::TagRef { tag } => match git.get_tag_ref(&tag, opts).await {
            Some(sha) => println!("{}", sha),
            None => return Ok(ExitCode::FAILURE),
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn outcome_label(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Unshallowed => "unshallowed",
        SyncOutcome::Fetched => "fetched",
        SyncOutcome::Skipped => "skipped",
    }
}

fn probe_label(probe: Probe) -> &'static str {
    match probe {
        Probe::Yes => "yes",
        Probe::No => "no",
        Probe::Indeterminate => "unknown",
    }
}

fn report_probe(probe: Probe) -> ExitCode {
    println!("{}", probe_label(probe));
    if probe.is_yes() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
