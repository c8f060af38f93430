//! Local quality gates.
//!
//! Gates run in a fixed order: choice integrity, then paragraph overlap,
//! then the difficulty floor. The first failing gate decides the error;
//! choice integrity reports all of its issues at once.

pub mod choices;
pub mod difficulty;

pub use choices::{check_choices, ChoiceIssue, CHOICE_LABELS};
pub use difficulty::{estimate_difficulty, meets_floor, DEFAULT_DIFFICULTY_FLOOR};

use serde::{Deserialize, Serialize};

use crate::text::{overlap_score, DEFAULT_NGRAM_SIZE};
use crate::types::Candidate;
use crate::ValidationError;

/// Default maximum question/paragraph overlap.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.25;

/// Tunables for the local gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalGateConfig {
    pub overlap_threshold: f64,
    pub ngram_size: usize,
    pub difficulty_floor: u8,
}

impl Default for LocalGateConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            ngram_size: DEFAULT_NGRAM_SIZE,
            difficulty_floor: DEFAULT_DIFFICULTY_FLOOR,
        }
    }
}

/// Scores computed while passing the local gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalGateReport {
    pub overlap_score: f64,
    pub heuristic_difficulty: u8,
}

/// Run every local gate against `candidate`.
pub fn run_local_gates(
    candidate: &Candidate,
    paragraph: &str,
    config: &LocalGateConfig,
) -> Result<LocalGateReport, ValidationError> {
    let issues = check_choices(candidate);
    if !issues.is_empty() {
        return Err(ValidationError::ChoiceIntegrity(issues));
    }

    let overlap = overlap_score(&candidate.question_text, paragraph, config.ngram_size);
    if overlap > config.overlap_threshold {
        return Err(ValidationError::Overlap {
            score: overlap,
            threshold: config.overlap_threshold,
        });
    }

    let heuristic = estimate_difficulty(candidate);
    if !meets_floor(heuristic, candidate.difficulty, config.difficulty_floor) {
        return Err(ValidationError::DifficultyFloor {
            heuristic,
            reported: candidate.difficulty,
            floor: config.difficulty_floor,
        });
    }

    Ok(LocalGateReport {
        overlap_score: overlap,
        heuristic_difficulty: heuristic,
    })
}
