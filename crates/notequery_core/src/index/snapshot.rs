//! Immutable point-in-time view of one corpus load.
//!
//! # Responsibility
//! - Validate loader records and assign note ids and positions.
//! - Own the notes together with the tag membership and inverted indices.
//!
//! # Invariants
//! - `notes[i].id == NoteId(i)` and ids ascend with `Position`.
//! - Field ordinals follow first appearance in the loader sequence.
//! - Building either yields a complete snapshot or a `BuildError`; there is
//!   no partially built state.

use crate::index::inverted::InvertedIndex;
use crate::index::tag_index::{TagCount, TagIndex};
use crate::model::note::{normalize_tag, CorpusRecord, Note, NoteId, Position};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Loader supplied inconsistent data; the whole build is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Record at `record` (0-based loader order) has a blank field name.
    EmptyField { record: usize },
    /// Record carries a tag no tag expression could reference.
    InvalidTag { record: usize, tag: String },
    /// Two records claim the same field/notebook/cell slot.
    DuplicatePosition {
        field: String,
        notebook: u32,
        cell: u32,
    },
    /// Corpus exceeds the id space.
    TooManyNotes { count: usize },
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { record } => write!(f, "record {record} has an empty field name"),
            Self::InvalidTag { record, tag } => {
                write!(f, "record {record} has invalid tag `{tag}`")
            }
            Self::DuplicatePosition {
                field,
                notebook,
                cell,
            } => write!(
                f,
                "duplicate note position field=`{field}` notebook={notebook} cell={cell}"
            ),
            Self::TooManyNotes { count } => write!(f, "corpus of {count} notes is too large"),
        }
    }
}

impl Error for BuildError {}

/// Immutable bundle of notes and their derived indices.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    generation: u64,
    notes: Vec<Note>,
    fields: Vec<String>,
    field_members: Vec<BTreeSet<NoteId>>,
    universe: BTreeSet<NoteId>,
    tags: TagIndex,
    terms: InvertedIndex,
}

impl IndexSnapshot {
    /// Snapshot with no notes; every query against it matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates `records` and builds all indices in one pass.
    ///
    /// # Errors
    /// Returns [`BuildError`] when a record has a blank field, an invalid
    /// tag, or a position already taken by another record.
    pub fn build(records: impl IntoIterator<Item = CorpusRecord>) -> Result<Self, BuildError> {
        let mut fields: Vec<String> = Vec::new();
        let mut field_ordinals: HashMap<String, u32> = HashMap::new();
        let mut seen_positions: HashSet<Position> = HashSet::new();
        let mut staged: Vec<(Position, CorpusRecord, BTreeSet<String>)> = Vec::new();

        for (record_index, mut record) in records.into_iter().enumerate() {
            let field = record.field.trim().to_string();
            if field.is_empty() {
                return Err(BuildError::EmptyField {
                    record: record_index,
                });
            }

            let mut tags = BTreeSet::new();
            for tag in &record.tags {
                let normalized = normalize_tag(tag).ok_or_else(|| BuildError::InvalidTag {
                    record: record_index,
                    tag: tag.clone(),
                })?;
                tags.insert(normalized);
            }

            let next_ordinal = u32::try_from(fields.len())
                .map_err(|_| BuildError::TooManyNotes { count: record_index })?;
            let field_ordinal = *field_ordinals.entry(field.clone()).or_insert_with(|| {
                fields.push(field.clone());
                next_ordinal
            });

            let position = Position {
                field: field_ordinal,
                notebook: record.notebook,
                cell: record.cell,
            };
            if !seen_positions.insert(position) {
                return Err(BuildError::DuplicatePosition {
                    field,
                    notebook: record.notebook,
                    cell: record.cell,
                });
            }

            record.field = field;
            staged.push((position, record, tags));
        }

        if u32::try_from(staged.len()).is_err() {
            return Err(BuildError::TooManyNotes {
                count: staged.len(),
            });
        }
        staged.sort_by_key(|(position, _, _)| *position);

        let mut field_members = vec![BTreeSet::new(); fields.len()];
        let notes = staged
            .into_iter()
            .enumerate()
            .map(|(index, (position, record, tags))| {
                // Bounded by the length check above.
                let id = NoteId(index as u32);
                field_members[position.field as usize].insert(id);
                Note {
                    id,
                    field: record.field,
                    tags,
                    body: record.body,
                    position,
                    external_id: record.external_id,
                }
            })
            .collect::<Vec<_>>();

        let universe = notes.iter().map(|note| note.id).collect();
        let tags = TagIndex::build(&notes);
        let terms = InvertedIndex::build(&notes);

        Ok(Self {
            generation: 0,
            notes,
            fields,
            field_members,
            universe,
            tags,
            terms,
        })
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Publication counter assigned by the owning engine; 0 before publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Notes in ascending position order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.index())
    }

    /// All note ids.
    pub fn universe(&self) -> &BTreeSet<NoteId> {
        &self.universe
    }

    /// Field names in ordinal order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Ids of notes owned by `field`, or `None` for an unknown field.
    pub fn field_scope(&self, field: &str) -> Option<&BTreeSet<NoteId>> {
        let ordinal = self.fields.iter().position(|name| name == field.trim())?;
        self.field_members.get(ordinal)
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.tags
    }

    pub fn inverted_index(&self) -> &InvertedIndex {
        &self.terms
    }

    /// Tag usage counts, optionally restricted to one field.
    ///
    /// An unknown field yields an empty list.
    pub fn tag_counts(&self, field: Option<&str>) -> Vec<TagCount> {
        match field {
            Some(name) => self
                .field_scope(name)
                .map(|scope| self.tags.counts_within(scope))
                .unwrap_or_default(),
            None => self.tags.counts_within(&self.universe),
        }
    }
}
