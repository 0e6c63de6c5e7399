//! Release notes attached to tags via `git notes`.
//!
//! Notes for a tag `R` are written to `refs/notes/<prefix>-<R>`. Readers query
//! `refs/notes/<prefix>*`, which covers those versioned namespaces as well as
//! the legacy unversioned `refs/notes/<prefix>`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::VcsResult;
use crate::exec::ExecOptions;
use crate::git::Git;

/// Tag name → note. Tags that share a commit share one `Arc`'d value.
pub type TagNotesMap = HashMap<String, Arc<Value>>;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"tag: ([^,)]+)").expect("tag pattern is valid"))
}

/// Tag names in a `%d` decoration, left to right.
///
/// `(HEAD -> main, tag: v1.0.0, origin/main)` yields `["v1.0.0"]`.
pub fn parse_decoration(decoration: &str) -> Vec<String> {
    tag_pattern()
        .captures_iter(decoration)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse `%d%x09%N` log output into a tag → note map.
///
/// Each line is handled on its own: a line without tag names or with an
/// unparseable note is skipped and the rest still contribute. When a tag
/// appears twice the last line wins.
pub fn parse_tags_notes(output: &str) -> TagNotesMap {
    let mut notes = TagNotesMap::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let (decoration, note) = line.split_once('\t').unwrap_or((line, ""));

        let tags = parse_decoration(decoration);
        if tags.is_empty() {
            debug!(line = %line, "no tag names in decoration, skipping");
            continue;
        }

        let value = match serde_json::from_str::<Value>(note.trim()) {
            Ok(value) => Arc::new(value),
            Err(e) => {
                debug!(?tags, error = %e, "unparseable note, skipping");
                continue;
            }
        };

        for tag in tags {
            notes.insert(tag, Arc::clone(&value));
        }
    }

    notes
}

impl Git {
    /// Notes of every directly tagged commit, keyed by tag name.
    ///
    /// A tag with no note is absent from the map.
    #[instrument(skip(self, options), fields(cwd = ?options.cwd))]
    pub async fn get_tags_notes(&self, options: &ExecOptions) -> VcsResult<TagNotesMap> {
        let notes_arg = format!("--notes={}", self.config().notes_glob());
        let output = self
            .exec(
                [
                    "log",
                    "--tags=*",
                    "--decorate-refs=refs/tags/*",
                    "--no-walk",
                    "--format=%d%x09%N",
                    notes_arg.as_str(),
                ],
                options,
            )
            .await?;

        let notes = parse_tags_notes(&output.stdout);
        debug!(count = notes.len(), "read tag notes");
        Ok(notes)
    }

    /// Attach `note` to `reference`, replacing any existing note.
    ///
    /// Git notes attach to the object `reference` names. For a lightweight
    /// tag that is the tagged commit, which is what [`Git::get_tags_notes`]
    /// reads. For an annotated tag it is the tag object itself: the note is
    /// still returned by [`Git::get_note`] but never shows up in
    /// `get_tags_notes`. Release tags created through [`Git::tag`] are
    /// lightweight.
    #[instrument(skip(self, note, options), fields(cwd = ?options.cwd))]
    pub async fn add_note(
        &self,
        note: &Value,
        reference: &str,
        options: &ExecOptions,
    ) -> VcsResult<()> {
        let notes_ref = self.config().versioned_note_ref(reference);
        let message = serde_json::to_string(note)?;
        self.exec(
            [
                "notes",
                "--ref",
                notes_ref.as_str(),
                "add",
                "-f",
                "-m",
                message.as_str(),
                reference,
            ],
            options,
        )
        .await?;
        Ok(())
    }

    /// Note attached to `reference`, as a JSON object.
    ///
    /// Reads the versioned namespace, then the legacy one; keys from the
    /// legacy note win. A missing note is an empty object.
    #[instrument(skip(self, options), fields(cwd = ?options.cwd))]
    pub async fn get_note(&self, reference: &str, options: &ExecOptions) -> VcsResult<Value> {
        let versioned = self.config().versioned_note_ref(reference);
        let legacy = self.config().note_ref.clone();

        let mut merged = Map::new();
        for notes_ref in [versioned, legacy] {
            let args = ["notes", "--ref", notes_ref.as_str(), "show", reference];
            let output = self.exec_unchecked(args, options).await?;
            // Exit code 1: no note for this object under this ref.
            if output.exit_code == 1 {
                continue;
            }
            let output = self.request(args, options).check(output)?;

            match serde_json::from_str::<Value>(output.stdout.trim())? {
                Value::Object(fields) => merged.extend(fields),
                other => debug!(notes_ref = %notes_ref, ?other, "note is not an object, ignoring"),
            }
        }

        Ok(Value::Object(merged))
    }
}
