//! Word n-gram overlap between a candidate question and its source.

use std::collections::HashSet;

use super::normalize::tokens;

/// Default n-gram length.
pub const DEFAULT_NGRAM_SIZE: usize = 5;

/// Distinct space-joined n-grams of `tokens`.
pub fn ngrams(tokens: &[String], n: usize) -> HashSet<String> {
    if n == 0 || tokens.len() < n {
        return HashSet::new();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Share of `a`'s n-grams that also appear in `b`.
///
/// Returns 0.0 when either side has fewer than `n` tokens.
pub fn overlap_score(a: &str, b: &str, n: usize) -> f64 {
    let grams_a = ngrams(&tokens(a), n);
    if grams_a.is_empty() {
        return 0.0;
    }
    let grams_b = ngrams(&tokens(b), n);
    if grams_b.is_empty() {
        return 0.0;
    }

    let shared = grams_a.intersection(&grams_b).count();
    shared as f64 / grams_a.len() as f64
}
