//! Derived, disposable indices over one corpus load.
//!
//! # Responsibility
//! - Build the tag membership index and the term inverted index.
//! - Bundle both with the notes into an immutable [`snapshot::IndexSnapshot`].
//!
//! # Invariants
//! - Indices are built in one bulk pass and never mutated afterwards.
//! - A failed build produces no snapshot at all.

pub mod inverted;
pub mod snapshot;
pub mod tag_index;
