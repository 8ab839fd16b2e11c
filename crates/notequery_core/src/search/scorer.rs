//! TF-IDF relevance scoring.
//!
//! # Invariants
//! - `TF` is 0 for an absent term and strictly increasing in raw count.
//! - `IDF` is finite for every document frequency in `1..=N`, strictly
//!   decreasing in document frequency, and 0 for a term absent from the
//!   corpus.
//! - Scores are summed in lexicographic term order so repeated runs yield
//!   bit-identical values.

use crate::index::inverted::InvertedIndex;
use crate::model::note::NoteId;
use std::collections::{BTreeMap, BTreeSet};

/// Log-dampened term frequency weight.
pub fn term_weight(count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    1.0 + f64::from(count).ln()
}

/// Smoothed inverse document frequency: `ln(1 + N / df)`.
pub fn inverse_document_frequency(document_frequency: usize, note_count: usize) -> f64 {
    if document_frequency == 0 || note_count == 0 {
        return 0.0;
    }
    (1.0 + note_count as f64 / document_frequency as f64).ln()
}

/// Scores every candidate note containing at least one query term.
///
/// Candidates without any query term are absent from the result; callers
/// treat them as score `0.0`.
pub fn score(
    query_terms: &BTreeSet<String>,
    index: &InvertedIndex,
    candidates: &BTreeSet<NoteId>,
) -> BTreeMap<NoteId, f64> {
    let mut scores: BTreeMap<NoteId, f64> = BTreeMap::new();
    if candidates.is_empty() {
        return scores;
    }

    for term in query_terms {
        let Some(postings) = index.postings(term) else {
            continue;
        };
        let idf = inverse_document_frequency(postings.len(), index.note_count());
        for (note_id, count) in postings {
            if !candidates.contains(note_id) {
                continue;
            }
            *scores.entry(*note_id).or_insert(0.0) += term_weight(*count) * idf;
        }
    }

    scores
}
