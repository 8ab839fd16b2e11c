//! Text tokenizer shared by indexing and natural-language queries.
//!
//! # Invariants
//! - Output terms are lowercase runs of letters and digits; never empty.
//! - The same function is used for note bodies and query text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid term regex"));

/// Splits `text` into normalized terms in source order.
///
/// Punctuation, whitespace, underscores and any other non-alphanumeric
/// characters act as boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TERM_RE
        .find_iter(&lowered)
        .map(|term| term.as_str().to_string())
        .collect()
}

/// Returns the distinct terms of `text` in lexicographic order.
pub fn unique_terms(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{tokenize, unique_terms};

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("Transformers, (self-)Attention & GPT-2!"),
            vec!["transformers", "self", "attention", "gpt", "2"]
        );
    }

    #[test]
    fn tokenize_splits_on_underscores_and_keeps_cyrillic() {
        assert_eq!(
            tokenize("Нейронные_сети: обзор"),
            vec!["нейронные", "сети", "обзор"]
        );
    }

    #[test]
    fn tokenize_blank_text_yields_nothing() {
        assert!(tokenize("  \t ... \n").is_empty());
    }

    #[test]
    fn unique_terms_deduplicates() {
        let terms = unique_terms("loss Loss LOSS gradient");
        assert_eq!(terms.len(), 2);
        assert!(terms.contains("loss"));
    }
}
