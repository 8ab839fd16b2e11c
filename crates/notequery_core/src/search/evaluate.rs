//! Tag-expression evaluation.
//!
//! # Invariants
//! - `NOT` always complements against the full universe, never against an
//!   enclosing `AND` scope.
//! - An unknown tag evaluates to the empty set.
//! - Evaluation of a parsed expression never fails.

use crate::index::tag_index::TagIndex;
use crate::model::note::NoteId;
use crate::search::tag_expr::TagExpr;
use std::collections::BTreeSet;

/// Evaluates `expr` over the corpus and returns every matching note id.
pub fn evaluate(
    expr: &TagExpr,
    tags: &TagIndex,
    universe: &BTreeSet<NoteId>,
) -> BTreeSet<NoteId> {
    match expr {
        TagExpr::Tag(name) => tags.notes_with(name).cloned().unwrap_or_default(),
        TagExpr::Not(child) => {
            let excluded = evaluate(child, tags, universe);
            universe.difference(&excluded).copied().collect()
        }
        TagExpr::And(left, right) => {
            let left = evaluate(left, tags, universe);
            if left.is_empty() {
                return left;
            }
            let right = evaluate(right, tags, universe);
            left.intersection(&right).copied().collect()
        }
        TagExpr::Or(left, right) => {
            let mut left = evaluate(left, tags, universe);
            left.extend(evaluate(right, tags, universe));
            left
        }
    }
}

/// Evaluates `expr` against a single note's tag set.
pub fn matches(expr: &TagExpr, note_tags: &BTreeSet<String>) -> bool {
    match expr {
        TagExpr::Tag(name) => note_tags.contains(name),
        TagExpr::Not(child) => !matches(child, note_tags),
        TagExpr::And(left, right) => matches(left, note_tags) && matches(right, note_tags),
        TagExpr::Or(left, right) => matches(left, note_tags) || matches(right, note_tags),
    }
}
