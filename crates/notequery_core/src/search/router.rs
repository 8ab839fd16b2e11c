//! Query routing: split, execute and order hybrid queries.
//!
//! # Responsibility
//! - Split a raw query on the reserved [`TAGS_KEYWORD`] into a
//!   natural-language part and a tag-expression part.
//! - Filter by tag expression, rank by TF-IDF, and order deterministically.
//!
//! # Invariants
//! - Results are ordered by descending score, then ascending position.
//! - A malformed tag expression is an error, never an empty or unfiltered
//!   result.
//! - Zero-score notes are dropped only for pure natural-language queries.
//! - Routing reads the snapshot only; concurrent calls need no locking.

use crate::index::snapshot::IndexSnapshot;
use crate::logging::query_log_fields;
use crate::model::note::NoteId;
use crate::search::evaluate::evaluate;
use crate::search::scorer::score;
use crate::search::tag_expr::{parse, ParseError};
use crate::search::tokenizer::unique_terms;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Keyword introducing the tag-expression part of a query. Matched
/// case-insensitively at a word start; only the first occurrence splits.
pub const TAGS_KEYWORD: &str = "tags:";

static TAGS_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btags:").expect("valid tags keyword regex"));

/// Raw query split into its two optional parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query<'a> {
    pub raw: &'a str,
    /// Trimmed text before the keyword; `None` when blank.
    pub natural_language: Option<&'a str>,
    /// Trimmed text after the keyword; `None` when blank or absent.
    pub tag_expression: Option<&'a str>,
}

impl<'a> Query<'a> {
    pub fn split(raw: &'a str) -> Self {
        let (text_part, tags_part) = match TAGS_KEYWORD_RE.find(raw) {
            Some(found) => (&raw[..found.start()], &raw[found.end()..]),
            None => (raw, ""),
        };
        Self {
            raw,
            natural_language: non_blank(text_part),
            tag_expression: non_blank(tags_part),
        }
    }

    fn mode(&self) -> &'static str {
        match (self.natural_language.is_some(), self.tag_expression.is_some()) {
            (true, true) => "hybrid",
            (true, false) => "text",
            (false, true) => "tags",
            (false, false) => "all",
        }
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Search options for one routed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Raw query text, optionally containing [`TAGS_KEYWORD`].
    pub text: String,
    /// Restricts results to one field. An unknown field matches nothing.
    pub field: Option<String>,
    /// Maximum number of hits; `None` returns all.
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Creates an unscoped request without a limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            field: None,
            limit: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ordered result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub note_id: NoteId,
    /// TF-IDF score; `0.0` when the query has no natural-language part.
    pub score: f64,
}

/// Routes `raw_query` over the whole corpus and returns ordered note ids.
pub fn route(raw_query: &str, snapshot: &IndexSnapshot) -> Result<Vec<NoteId>, ParseError> {
    let hits = search(&SearchRequest::new(raw_query), snapshot)?;
    Ok(hits.into_iter().map(|hit| hit.note_id).collect())
}

/// Executes one request against `snapshot`.
///
/// # Errors
/// Returns [`ParseError`] when the tag-expression part is malformed.
pub fn search(
    request: &SearchRequest,
    snapshot: &IndexSnapshot,
) -> Result<Vec<SearchHit>, ParseError> {
    let query = Query::split(&request.text);

    let mut candidates = match query.tag_expression {
        Some(expression) => {
            let expr = parse(expression)?;
            evaluate(&expr, snapshot.tag_index(), snapshot.universe())
        }
        None => snapshot.universe().clone(),
    };

    if let Some(field) = request.field.as_deref() {
        candidates = match snapshot.field_scope(field) {
            Some(scope) => candidates.intersection(scope).copied().collect(),
            None => BTreeSet::new(),
        };
    }
    let candidate_count = candidates.len();

    let mut hits = match query.natural_language {
        Some(text) => {
            let terms = unique_terms(text);
            let scores = score(&terms, snapshot.inverted_index(), &candidates);
            let drop_unscored = query.tag_expression.is_none();
            candidates
                .into_iter()
                .map(|note_id| SearchHit {
                    note_id,
                    score: scores.get(&note_id).copied().unwrap_or(0.0),
                })
                .filter(|hit| !drop_unscored || hit.score > 0.0)
                .collect::<Vec<_>>()
        }
        None => candidates
            .into_iter()
            .map(|note_id| SearchHit {
                note_id,
                score: 0.0,
            })
            .collect::<Vec<_>>(),
    };

    let position = |id: NoteId| snapshot.note(id).map(|note| note.position);
    hits.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| position(left.note_id).cmp(&position(right.note_id)))
    });
    if let Some(limit) = request.limit {
        hits.truncate(limit);
    }

    debug!(
        "event=query_route module=search status=ok mode={} generation={} candidates={} hits={} {}",
        query.mode(),
        snapshot.generation(),
        candidate_count,
        hits.len(),
        query_log_fields(&request.text)
    );
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::{route, search, Query, SearchRequest};
    use crate::index::snapshot::IndexSnapshot;
    use crate::model::note::{CorpusRecord, NoteId};
    use crate::search::tag_expr::ParseError;

    #[test]
    fn split_uses_first_keyword_case_insensitively() {
        let query = Query::split("  neural nets TAGS: nlp AND tags_x ");
        assert_eq!(query.natural_language, Some("neural nets"));
        assert_eq!(query.tag_expression, Some("nlp AND tags_x"));

        let second = Query::split("a tags: b tags: c");
        assert_eq!(second.natural_language, Some("a"));
        assert_eq!(second.tag_expression, Some("b tags: c"));
    }

    #[test]
    fn keyword_inside_a_word_does_not_split() {
        let query = Query::split("hashtags: twitter");
        assert_eq!(query.natural_language, Some("hashtags: twitter"));
        assert_eq!(query.tag_expression, None);

        let mixed = Query::split("hashtags: twitter (tags: social)");
        assert_eq!(mixed.natural_language, Some("hashtags: twitter ("));
        assert_eq!(mixed.tag_expression, Some("social)"));
    }

    #[test]
    fn split_handles_missing_parts() {
        let only_text = Query::split("attention");
        assert_eq!(only_text.natural_language, Some("attention"));
        assert_eq!(only_text.tag_expression, None);

        let only_tags = Query::split("tags: nlp");
        assert_eq!(only_tags.natural_language, None);
        assert_eq!(only_tags.tag_expression, Some("nlp"));

        let empty_tags = Query::split("attention tags:   ");
        assert_eq!(empty_tags.tag_expression, None);

        let blank = Query::split("   ");
        assert_eq!(blank.natural_language, None);
        assert_eq!(blank.tag_expression, None);
    }

    fn corpus() -> IndexSnapshot {
        IndexSnapshot::build(vec![
            CorpusRecord::new("ml", 0, 0, &["nlp"], "kernel methods"),
            CorpusRecord::new("ml", 0, 1, &["nlp", "deprecated"], "kernel kernel kernel"),
            CorpusRecord::new("ml", 1, 0, &["cv"], "kernel trick for images"),
            CorpusRecord::new("cs", 0, 0, &["nlp"], "parsing"),
        ])
        .unwrap()
    }

    #[test]
    fn empty_query_lists_everything_in_position_order() {
        let snapshot = corpus();
        assert_eq!(
            route("", &snapshot).unwrap(),
            vec![NoteId(0), NoteId(1), NoteId(2), NoteId(3)]
        );
    }

    #[test]
    fn hybrid_query_keeps_zero_score_tag_matches() {
        let snapshot = corpus();
        let hits = search(
            &SearchRequest::new("kernel tags: nlp AND NOT deprecated"),
            &snapshot,
        )
        .unwrap();
        let ids = hits.iter().map(|hit| hit.note_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![NoteId(0), NoteId(3)]);
        assert!(hits[0].score > 0.0);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn field_scope_and_limit_restrict_results() {
        let snapshot = corpus();
        let request = SearchRequest::new("tags: nlp").with_field("ml");
        let ids = search(&request, &snapshot)
            .unwrap()
            .into_iter()
            .map(|hit| hit.note_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![NoteId(0), NoteId(1)]);

        let limited = search(&SearchRequest::new("kernel").with_limit(1), &snapshot).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].note_id, NoteId(1));

        let unknown = search(&SearchRequest::new("").with_field("bio"), &snapshot).unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn malformed_tag_part_surfaces_parse_error() {
        let snapshot = corpus();
        let err = route("kernel tags: nlp AND", &snapshot).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEnd { .. }));
    }
}
