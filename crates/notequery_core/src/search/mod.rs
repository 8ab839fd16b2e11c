//! Query engine entry points.
//!
//! # Responsibility
//! - Tokenize text, parse and evaluate tag expressions, score by TF-IDF.
//! - Route hybrid queries into ordered results.
//!
//! # Invariants
//! - Every function here is a pure computation over an immutable snapshot.

pub mod evaluate;
pub mod router;
pub mod scorer;
pub mod tag_expr;
pub mod tokenizer;
