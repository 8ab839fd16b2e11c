//! Core query engine for tagged note collections.
//! This crate owns the query language, the indices and the corpus store.

pub mod config;
pub mod db;
pub mod engine;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, EngineConfig, FieldConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::{ReloadReport, SearchEngine, SearchResponse};
pub use index::snapshot::{BuildError, IndexSnapshot};
pub use index::tag_index::TagCount;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{CorpusRecord, Note, NoteId, Position};
pub use repo::note_repo::{NoteRepository, RepoError, RepoResult, SqliteNoteRepository};
pub use search::router::{route, search, Query, SearchHit, SearchRequest, TAGS_KEYWORD};
pub use search::tag_expr::{parse, ParseError, TagExpr};
pub use service::corpus_service::{CorpusService, CorpusServiceError, ImportReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
