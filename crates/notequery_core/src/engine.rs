//! Snapshot holder with atomic publish on reload.
//!
//! # Responsibility
//! - Keep the active [`IndexSnapshot`] and hand it out to queries.
//! - Build replacement snapshots off to the side and publish them in one
//!   assignment.
//!
//! # Invariants
//! - An in-flight query sees either the fully old or the fully new snapshot.
//! - A failed build leaves the active snapshot untouched.
//! - Generations increase by one per successful publish; the initial empty
//!   snapshot is generation 0.

use crate::index::snapshot::{BuildError, IndexSnapshot};
use crate::logging::query_log_fields;
use crate::model::note::{CorpusRecord, NoteId};
use crate::search::router::{search, SearchHit, SearchRequest};
use crate::search::tag_expr::ParseError;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Summary of one successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub generation: u64,
    pub notes: usize,
    pub fields: usize,
    pub tags: usize,
    pub terms: usize,
    /// `false` when a newer snapshot was already active and this build was
    /// discarded.
    pub published: bool,
}

/// Query result bound to the snapshot it was computed on.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Snapshot the hits refer to; resolve ids against this, not the engine.
    pub snapshot: Arc<IndexSnapshot>,
}

impl SearchResponse {
    pub fn note_ids(&self) -> Vec<NoteId> {
        self.hits.iter().map(|hit| hit.note_id).collect()
    }
}

/// Read-mostly search engine shared across threads.
#[derive(Debug)]
pub struct SearchEngine {
    active: RwLock<Arc<IndexSnapshot>>,
    next_generation: AtomicU64,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    /// Creates an engine serving an empty snapshot.
    pub fn new() -> Self {
        Self {
            active: RwLock::new(Arc::new(IndexSnapshot::empty())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Returns the active snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        // Writers only ever assign a complete Arc, so a poisoned lock still
        // guards a consistent value.
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuilds all indices from `records` and publishes the result.
    ///
    /// # Errors
    /// Returns [`BuildError`] when the records are inconsistent. The
    /// previously active snapshot keeps serving queries in that case.
    pub fn reload(
        &self,
        records: impl IntoIterator<Item = CorpusRecord>,
    ) -> Result<ReloadReport, BuildError> {
        let started_at = Instant::now();
        info!("event=index_reload module=engine status=start");

        let built = match IndexSnapshot::build(records) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(
                    "event=index_reload module=engine status=error duration_ms={} active_generation={} error={}",
                    started_at.elapsed().as_millis(),
                    self.snapshot().generation(),
                    err
                );
                return Err(err);
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        Ok(self.publish(built.with_generation(generation), started_at))
    }

    /// Swaps `built` in unless a newer generation is already active.
    fn publish(&self, built: IndexSnapshot, started_at: Instant) -> ReloadReport {
        let snapshot = Arc::new(built);
        let mut report = ReloadReport {
            generation: snapshot.generation(),
            notes: snapshot.len(),
            fields: snapshot.fields().len(),
            tags: snapshot.tag_index().len(),
            terms: snapshot.inverted_index().term_count(),
            published: false,
        };

        let active_generation = {
            let mut active = self
                .active
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            // A slower concurrent reload must not replace a newer snapshot.
            if active.generation() < report.generation {
                *active = snapshot;
                report.published = true;
            }
            active.generation()
        };

        if !report.published {
            debug!(
                "event=index_reload module=engine status=superseded duration_ms={} generation={} active_generation={}",
                started_at.elapsed().as_millis(),
                report.generation,
                active_generation
            );
            return report;
        }

        info!(
            "event=index_reload module=engine status=ok duration_ms={} generation={} notes={} fields={} tags={} terms={}",
            started_at.elapsed().as_millis(),
            report.generation,
            report.notes,
            report.fields,
            report.tags,
            report.terms
        );
        report
    }

    /// Routes `request` against the active snapshot.
    ///
    /// # Errors
    /// Returns [`ParseError`] for a malformed tag-expression part.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ParseError> {
        let snapshot = self.snapshot();
        let hits = search(request, &snapshot).map_err(|err| {
            warn!(
                "event=query_parse module=engine status=error generation={} position={} error_kind={} {}",
                snapshot.generation(),
                err.position(),
                err.kind(),
                query_log_fields(&request.text)
            );
            err
        })?;
        Ok(SearchResponse { hits, snapshot })
    }
}

#[cfg(test)]
mod tests {
    use super::SearchEngine;
    use crate::index::snapshot::{BuildError, IndexSnapshot};
    use crate::model::note::{CorpusRecord, NoteId};
    use crate::search::router::SearchRequest;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    fn records() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord::new("ml", 0, 0, &["nlp"], "transformers"),
            CorpusRecord::new("ml", 0, 1, &["cv"], "convolutions"),
        ]
    }

    #[test]
    fn new_engine_serves_empty_snapshot() {
        let engine = SearchEngine::new();
        let response = engine.search(&SearchRequest::new("")).unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.snapshot.generation(), 0);
    }

    #[test]
    fn reload_publishes_increasing_generations() {
        let engine = SearchEngine::new();
        let first = engine.reload(records()).unwrap();
        let second = engine.reload(records()).unwrap();

        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
        assert!(first.published && second.published);
        assert_eq!(second.notes, 2);
        assert_eq!(second.fields, 1);
        assert_eq!(engine.snapshot().generation(), 2);
    }

    #[test]
    fn slower_reload_does_not_replace_newer_snapshot() {
        let engine = SearchEngine::new();
        // Reserve generation 1 as if a slow reload had started first.
        let stale_generation = engine.next_generation.fetch_add(1, Ordering::SeqCst);
        engine.reload(records()).unwrap();

        let stale = IndexSnapshot::build(vec![CorpusRecord::new("cs", 0, 0, &[], "graphs")])
            .unwrap()
            .with_generation(stale_generation);
        let report = engine.publish(stale, Instant::now());

        assert!(!report.published);
        assert_eq!(report.generation, 1);
        assert_eq!(engine.snapshot().generation(), 2);
        assert_eq!(engine.snapshot().len(), 2);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let engine = SearchEngine::new();
        engine.reload(records()).unwrap();

        let mut broken = records();
        broken.push(CorpusRecord::new("ml", 0, 0, &[], "collides"));
        let err = engine.reload(broken).unwrap_err();
        assert!(matches!(err, BuildError::DuplicatePosition { .. }));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.len(), 2);
        let response = engine.search(&SearchRequest::new("tags: nlp")).unwrap();
        assert_eq!(response.note_ids(), vec![NoteId(0)]);
    }

    #[test]
    fn held_response_keeps_its_snapshot_across_reload() {
        let engine = SearchEngine::new();
        engine.reload(records()).unwrap();
        let before = engine.search(&SearchRequest::new("")).unwrap();

        engine
            .reload(vec![CorpusRecord::new("cs", 0, 0, &[], "graphs")])
            .unwrap();

        assert_eq!(before.snapshot.len(), 2);
        assert_eq!(before.hits.len(), 2);
        assert_eq!(engine.snapshot().len(), 1);
    }
}
