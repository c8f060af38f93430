//! # quizforge-core
//!
//! Deterministic quality gates for generated multiple-choice questions.
//!
//! This crate answers, without any network access:
//! - Is the candidate structurally sound (four distinct labelled choices)?
//! - Did it copy its source paragraph instead of testing it?
//! - Is it hard enough to be worth asking?
//! - How close is it to the questions we already have?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same input, same verdict
//! 2. **No model calls**: gates are rule tables and arithmetic
//! 3. **Complete reports**: choice integrity lists every issue it finds
//!
//! ## Example
//!
//! ```rust,ignore
//! use quizforge_core::{parse_candidate, run_local_gates, LocalGateConfig};
//!
//! let candidate = parse_candidate(&reply_json)?;
//! let report = run_local_gates(&candidate, paragraph, &LocalGateConfig::default())?;
//! println!("overlap {:.2}, difficulty {}", report.overlap_score, report.heuristic_difficulty);
//! ```

pub mod gates;
pub mod hashing;
pub mod response;
pub mod rules;
pub mod similarity;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use gates::{
    check_choices, estimate_difficulty, run_local_gates, ChoiceIssue, LocalGateConfig,
    LocalGateReport, CHOICE_LABELS,
};
pub use hashing::CacheKey;
pub use response::{extract_json_object, parse_candidate, parse_verification, ResponseKind};
pub use rules::{detect_language, resolve_language, tag_topics};
pub use similarity::{
    assess_similarity, cosine_similarity, decide_similarity_action, SimilarityThresholds,
};
pub use text::{normalize, overlap_score, tokens};
pub use types::{
    Candidate, Choice, ExistingQuestion, Language, QuestionResult, SimilarityAction,
    SimilarityAssessment, SimilarityMatch, SourceParagraph, StyleCorpus, VerificationOutcome,
};

use thiserror::Error;

/// A candidate failed a local gate or its reply broke the contract.
///
/// Always recoverable: the pipeline discards the candidate and tries again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Choice integrity failed: {}", join_issues(.0))]
    ChoiceIntegrity(Vec<ChoiceIssue>),

    #[error("Question overlaps its source paragraph ({score:.2} > {threshold:.2})")]
    Overlap { score: f64, threshold: f64 },

    #[error("Difficulty below floor {floor} (heuristic {heuristic}, reported {reported})")]
    DifficultyFloor { heuristic: u8, reported: u8, floor: u8 },

    #[error("Reply violates its schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Malformed reply: {0}")]
    Malformed(String),
}

impl ValidationError {
    /// Short code used in logs and in feedback to the generator.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ChoiceIntegrity(_) => "choice_integrity",
            ValidationError::Overlap { .. } => "overlap",
            ValidationError::DifficultyFloor { .. } => "difficulty_floor",
            ValidationError::Schema(_) => "schema",
            ValidationError::Malformed(_) => "malformed",
        }
    }
}

fn join_issues(issues: &[ChoiceIssue]) -> String {
    issues
        .iter()
        .map(ChoiceIssue::code)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_integrity_message_lists_codes() {
        let err = ValidationError::ChoiceIntegrity(vec![
            ChoiceIssue::DuplicateLabels,
            ChoiceIssue::CorrectLabelNotInChoices,
        ]);
        assert_eq!(
            err.to_string(),
            "Choice integrity failed: duplicate_labels, correct_label_not_in_choices"
        );
        assert_eq!(err.code(), "choice_integrity");
    }

    #[test]
    fn test_overlap_message() {
        let err = ValidationError::Overlap {
            score: 0.5,
            threshold: 0.25,
        };
        assert_eq!(
            err.to_string(),
            "Question overlaps its source paragraph (0.50 > 0.25)"
        );
    }
}
