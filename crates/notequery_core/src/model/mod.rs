//! Domain model for indexed notes.
//!
//! # Responsibility
//! - Define the records produced by corpus loaders and owned by snapshots.
//!
//! # Invariants
//! - Notes are immutable once built; a reload replaces them wholesale.

pub mod note;
