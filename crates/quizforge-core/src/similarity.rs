//! Style-similarity gate.
//!
//! A candidate should read like the existing bank without duplicating any
//! of it. The gate compares the candidate embedding against the corpus
//! embeddings and maps the best cosine onto accept / revise / reject.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::{SimilarityAction, SimilarityAssessment, SimilarityMatch};

pub const REASON_SKIPPED_NO_CORPUS: &str = "skipped_no_corpus";
pub const REASON_NEAR_DUPLICATE: &str = "near_duplicate";
pub const REASON_TOO_FAR: &str = "too_far_from_corpus_style";
pub const REASON_OUTSIDE_WINDOW: &str = "outside_target_window";
pub const REASON_WITHIN_WINDOW: &str = "within_target_window";
/// An embedding produced a NaN or infinite cosine
pub const REASON_NON_FINITE: &str = "non_finite_similarity";

/// Cosine thresholds plus corpus sampling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityThresholds {
    /// Above this the candidate duplicates an existing question
    pub duplicate: f32,
    /// Below this the candidate does not match the bank's style
    pub too_far: f32,
    pub target_min: f32,
    pub target_max: f32,
    /// Matches reported in the assessment
    pub top_k: usize,
    /// Maximum corpus texts compared per candidate
    pub corpus_limit: usize,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            duplicate: 0.92,
            too_far: 0.55,
            target_min: 0.65,
            target_max: 0.85,
            top_k: 5,
            corpus_limit: 400,
        }
    }
}

impl SimilarityThresholds {
    /// Check `0 <= too_far <= target_min <= target_max <= duplicate <= 1`.
    pub fn validate(&self) -> Result<(), String> {
        let ordered = [
            ("too_far", self.too_far),
            ("target_min", self.target_min),
            ("target_max", self.target_max),
            ("duplicate", self.duplicate),
        ];
        for (name, value) in ordered {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("similarity.{} must be within [0, 1], got {}", name, value));
            }
        }
        for pair in ordered.windows(2) {
            let ((lo_name, lo), (hi_name, hi)) = (pair[0], pair[1]);
            if lo > hi {
                return Err(format!(
                    "similarity.{} ({}) must not exceed similarity.{} ({})",
                    lo_name, lo, hi_name, hi
                ));
            }
        }
        if self.top_k == 0 {
            return Err("similarity.top_k must be at least 1".to_string());
        }
        if self.corpus_limit == 0 {
            return Err("similarity.corpus_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (dot / denominator).clamp(-1.0, 1.0)
}

/// Map the best cosine onto an action and a reason code.
pub fn decide_similarity_action(
    max_cosine: f32,
    thresholds: &SimilarityThresholds,
) -> (SimilarityAction, &'static str) {
    if !max_cosine.is_finite() {
        (SimilarityAction::Revise, REASON_NON_FINITE)
    } else if max_cosine > thresholds.duplicate {
        (SimilarityAction::Reject, REASON_NEAR_DUPLICATE)
    } else if max_cosine < thresholds.too_far {
        (SimilarityAction::Revise, REASON_TOO_FAR)
    } else if max_cosine < thresholds.target_min || max_cosine > thresholds.target_max {
        (SimilarityAction::Revise, REASON_OUTSIDE_WINDOW)
    } else {
        (SimilarityAction::Accept, REASON_WITHIN_WINDOW)
    }
}

/// Assessment returned when there is nothing to compare against.
pub fn skipped_assessment() -> SimilarityAssessment {
    SimilarityAssessment {
        action: SimilarityAction::Accept,
        reason: REASON_SKIPPED_NO_CORPUS.to_string(),
        max_cosine_to_any_existing: None,
        top_matches: Vec::new(),
    }
}

/// Assess `candidate` against corpus texts and their aligned embeddings.
pub fn assess_similarity(
    candidate: &[f32],
    corpus_texts: &[String],
    corpus_embeddings: &[Vec<f32>],
    thresholds: &SimilarityThresholds,
) -> SimilarityAssessment {
    if corpus_texts.is_empty() || corpus_embeddings.is_empty() {
        return skipped_assessment();
    }

    let mut scored: Vec<SimilarityMatch> = corpus_texts
        .iter()
        .zip(corpus_embeddings.iter())
        .take(thresholds.corpus_limit)
        .map(|(text, embedding)| SimilarityMatch {
            text: text.clone(),
            cosine: cosine_similarity(candidate, embedding),
        })
        .collect();
    // NaN has no place in the sort order
    let non_finite = scored.iter().any(|m| !m.cosine.is_finite());
    scored.sort_by(|a, b| b.cosine.partial_cmp(&a.cosine).unwrap_or(Ordering::Equal));
    scored.truncate(thresholds.top_k);

    let max_cosine = if non_finite {
        f32::NAN
    } else {
        scored.first().map(|m| m.cosine).unwrap_or(0.0)
    };
    let (action, reason) = decide_similarity_action(max_cosine, thresholds);

    SimilarityAssessment {
        action,
        reason: reason.to_string(),
        max_cosine_to_any_existing: Some(max_cosine),
        top_matches: scored,
    }
}
