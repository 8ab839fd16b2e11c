//! Note domain model.
//!
//! # Responsibility
//! - Define the immutable note record shared by every index in a snapshot.
//! - Define the loader tuple (`CorpusRecord`) and its normalization rules.
//!
//! # Invariants
//! - `NoteId` values are dense and assigned in ascending `Position` order.
//! - Note tags are lowercase identifiers (alphanumerics and `_`).
//! - A note is never mutated after the snapshot that owns it is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Dense per-snapshot note identifier.
///
/// Ids are only meaningful for the snapshot that assigned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(pub u32);

impl NoteId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Default ordering key of a note.
///
/// Compared lexicographically: field ordinal, then notebook, then cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Ordinal of the owning field in loader order.
    pub field: u32,
    /// Notebook ordinal within the field.
    pub notebook: u32,
    /// Cell ordinal within the notebook.
    pub cell: u32,
}

/// One source note as supplied by a corpus loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Owning knowledge domain.
    pub field: String,
    /// Notebook ordinal within `field`.
    pub notebook: u32,
    /// Cell ordinal within the notebook.
    pub cell: u32,
    /// Free-form tags; normalized to lowercase when the snapshot is built.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Display text (Markdown).
    pub body: String,
    /// Loader-owned identifier carried through to result consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl CorpusRecord {
    pub fn new(
        field: impl Into<String>,
        notebook: u32,
        cell: u32,
        tags: &[&str],
        body: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            notebook,
            cell,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            body: body.into(),
            external_id: None,
        }
    }
}

/// Immutable indexed note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: NoteId,
    pub field: String,
    pub tags: BTreeSet<String>,
    pub body: String,
    pub position: Position,
    pub external_id: Option<String>,
}

impl Note {
    /// Returns the first non-blank body line without Markdown heading markers.
    ///
    /// Returns an empty string for a blank body.
    pub fn title(&self) -> &str {
        self.body
            .lines()
            .map(|line| line.trim_start_matches('#').trim())
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Normalizes one tag according to the query-language identifier rules.
///
/// Returns `None` for blank tags or tags containing characters a tag
/// expression could never reference.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() || !trimmed.chars().all(is_tag_char) {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Returns whether `ch` may appear inside a tag identifier.
pub fn is_tag_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
