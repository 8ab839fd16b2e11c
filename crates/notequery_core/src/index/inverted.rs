//! Full-text inverted index: term -> note -> raw term frequency.
//!
//! # Invariants
//! - `document_frequency(t)` equals the number of notes whose tokenized body
//!   contains `t` at least once.
//! - Stored frequencies are always >= 1.

use crate::model::note::{Note, NoteId};
use crate::search::tokenizer::tokenize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvertedIndex {
    postings: HashMap<String, BTreeMap<NoteId, u32>>,
    note_count: usize,
}

impl InvertedIndex {
    /// Tokenizes every note body and accumulates term counts.
    pub fn build<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        let mut postings: HashMap<String, BTreeMap<NoteId, u32>> = HashMap::new();
        let mut note_count = 0;

        for note in notes {
            note_count += 1;
            let mut counts: HashMap<String, u32> = HashMap::new();
            for term in tokenize(&note.body) {
                *counts.entry(term).or_insert(0) += 1;
            }
            for (term, count) in counts {
                postings.entry(term).or_default().insert(note.id, count);
            }
        }

        Self {
            postings,
            note_count,
        }
    }

    /// Number of indexed notes.
    pub fn note_count(&self) -> usize {
        self.note_count
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, BTreeMap::len)
    }

    pub fn term_frequency(&self, term: &str, note: NoteId) -> u32 {
        self.postings
            .get(term)
            .and_then(|notes| notes.get(&note))
            .copied()
            .unwrap_or(0)
    }

    /// Per-note raw counts for `term`, ordered by note id.
    pub fn postings(&self, term: &str) -> Option<&BTreeMap<NoteId, u32>> {
        self.postings.get(term)
    }
}

#[cfg(test)]
mod tests {
    use super::InvertedIndex;
    use crate::model::note::{Note, NoteId, Position};
    use std::collections::BTreeSet;

    fn note(id: u32, body: &str) -> Note {
        Note {
            id: NoteId(id),
            field: "ml".to_string(),
            tags: BTreeSet::new(),
            body: body.to_string(),
            position: Position {
                field: 0,
                notebook: 0,
                cell: id,
            },
            external_id: None,
        }
    }

    #[test]
    fn counts_raw_frequency_and_document_frequency() {
        let notes = vec![
            note(0, "Loss, loss and more LOSS."),
            note(1, "gradient of the loss"),
            note(2, "nothing relevant"),
        ];
        let index = InvertedIndex::build(&notes);

        assert_eq!(index.note_count(), 3);
        assert_eq!(index.term_frequency("loss", NoteId(0)), 3);
        assert_eq!(index.term_frequency("loss", NoteId(1)), 1);
        assert_eq!(index.term_frequency("loss", NoteId(2)), 0);
        assert_eq!(index.document_frequency("loss"), 2);
        assert_eq!(index.document_frequency("absent"), 0);
    }

    #[test]
    fn empty_corpus_has_no_terms() {
        let index = InvertedIndex::build(&Vec::<Note>::new());
        assert_eq!(index.note_count(), 0);
        assert_eq!(index.term_count(), 0);
    }
}
