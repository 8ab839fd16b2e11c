//! Corpus store repositories.
//!
//! # Responsibility
//! - Define the note/tag persistence contract used by corpus loading.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `UnknownField`,
//!   `DuplicatePosition`) in addition to transport errors.

pub mod note_repo;
