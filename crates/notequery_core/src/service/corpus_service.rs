//! Corpus use-case service.
//!
//! # Responsibility
//! - Import loader records into the corpus store.
//! - Load the stored corpus and publish it to a [`SearchEngine`].
//!
//! # Invariants
//! - Fields are registered in first-appearance order before any note of an
//!   import is written.
//! - A failed reload leaves the engine serving its previous snapshot.

use crate::engine::{ReloadReport, SearchEngine};
use crate::index::snapshot::BuildError;
use crate::model::note::CorpusRecord;
use crate::repo::note_repo::{NoteRepository, NoteUuid, RepoError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for corpus use-cases.
#[derive(Debug)]
pub enum CorpusServiceError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Stored corpus could not be indexed.
    Build(BuildError),
}

impl Display for CorpusServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Build(err) => write!(f, "index build failed: {err}"),
        }
    }
}

impl Error for CorpusServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Build(err) => Some(err),
        }
    }
}

impl From<RepoError> for CorpusServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<BuildError> for CorpusServiceError {
    fn from(value: BuildError) -> Self {
        Self::Build(value)
    }
}

/// Outcome of one import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Store ids of the created notes, in input order.
    pub note_ids: Vec<NoteUuid>,
    /// Number of distinct fields referenced by the input.
    pub fields: usize,
}

/// Corpus service facade over repository implementations.
pub struct CorpusService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> CorpusService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers `fields` in order; already known fields keep their ordinal.
    pub fn register_fields<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), CorpusServiceError> {
        for field in fields {
            self.repo.register_field(field)?;
        }
        Ok(())
    }

    /// Returns registered field names in ordinal order.
    pub fn list_fields(&self) -> Result<Vec<String>, CorpusServiceError> {
        Ok(self.repo.list_fields()?)
    }

    /// Stores `records`, registering their fields first.
    ///
    /// Each note is written in its own transaction; on error, notes stored
    /// before the failing record stay in the store.
    pub fn import_records(
        &mut self,
        records: &[CorpusRecord],
    ) -> Result<ImportReport, CorpusServiceError> {
        let started_at = Instant::now();
        info!(
            "event=corpus_import module=service status=start records={}",
            records.len()
        );

        let result = self.import_inner(records);
        match &result {
            Ok(report) => info!(
                "event=corpus_import module=service status=ok duration_ms={} notes={} fields={}",
                started_at.elapsed().as_millis(),
                report.note_ids.len(),
                report.fields
            ),
            Err(err) => error!(
                "event=corpus_import module=service status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn import_inner(&mut self, records: &[CorpusRecord]) -> Result<ImportReport, CorpusServiceError> {
        let mut seen: Vec<&str> = Vec::new();
        for record in records {
            let field = record.field.trim();
            if !seen.contains(&field) {
                seen.push(field);
            }
        }
        self.register_fields(seen.iter().copied())?;

        let mut note_ids = Vec::with_capacity(records.len());
        for record in records {
            note_ids.push(self.repo.create_note(record)?);
        }

        Ok(ImportReport {
            note_ids,
            fields: seen.len(),
        })
    }

    /// Loads the stored corpus as loader records in position order.
    pub fn load_records(&self) -> Result<Vec<CorpusRecord>, CorpusServiceError> {
        Ok(self.repo.load_corpus()?)
    }

    /// Rebuilds `engine` from the current store contents.
    pub fn reload_engine(&self, engine: &SearchEngine) -> Result<ReloadReport, CorpusServiceError> {
        let records = self.load_records()?;
        Ok(engine.reload(records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{CorpusService, CorpusServiceError};
    use crate::db::open_db_in_memory;
    use crate::engine::SearchEngine;
    use crate::model::note::CorpusRecord;
    use crate::repo::note_repo::{RepoError, SqliteNoteRepository};
    use crate::search::router::SearchRequest;

    #[test]
    fn import_then_reload_serves_stored_notes() {
        let mut conn = open_db_in_memory().unwrap();
        let mut service = CorpusService::new(SqliteNoteRepository::new(&mut conn));

        let report = service
            .import_records(&[
                CorpusRecord::new("ml", 0, 1, &["NLP"], "## Attention\nattention is all"),
                CorpusRecord::new("cs", 0, 0, &["graphs"], "## BFS"),
                CorpusRecord::new("ml", 0, 0, &["cv"], "## Convolutions"),
            ])
            .unwrap();
        assert_eq!(report.note_ids.len(), 3);
        assert_eq!(report.fields, 2);
        assert_eq!(service.list_fields().unwrap(), vec!["ml", "cs"]);

        let engine = SearchEngine::new();
        let reload = service.reload_engine(&engine).unwrap();
        assert_eq!(reload.notes, 3);

        let response = engine.search(&SearchRequest::new("tags: nlp")).unwrap();
        let snapshot = &response.snapshot;
        let hit = snapshot.note(response.hits[0].note_id).unwrap();
        assert_eq!(hit.title(), "Attention");
        assert_eq!(
            hit.external_id.as_deref(),
            Some(report.note_ids[0].to_string().as_str())
        );

        let all = engine.search(&SearchRequest::new("")).unwrap();
        let bodies = all
            .hits
            .iter()
            .filter_map(|hit| all.snapshot.note(hit.note_id))
            .map(|note| note.title().to_string())
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec!["Convolutions", "Attention", "BFS"]);
    }

    #[test]
    fn duplicate_slot_is_rejected_on_import() {
        let mut conn = open_db_in_memory().unwrap();
        let mut service = CorpusService::new(SqliteNoteRepository::new(&mut conn));

        let err = service
            .import_records(&[
                CorpusRecord::new("ml", 0, 0, &[], "first"),
                CorpusRecord::new("ml", 0, 0, &[], "second"),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            CorpusServiceError::Repo(RepoError::DuplicatePosition { .. })
        ));
    }
}
