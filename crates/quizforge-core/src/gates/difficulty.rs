//! Heuristic difficulty estimate and the difficulty floor.

use crate::rules::{markers_present, MarkerKind};
use crate::text::normalize;
use crate::types::Candidate;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;
pub const DEFAULT_DIFFICULTY_FLOOR: u8 = 2;

/// Normalized length above which a question counts as long.
pub const LONG_TEXT_CHARS: usize = 180;
/// Normalized length above which a question counts as very long.
pub const VERY_LONG_TEXT_CHARS: usize = 320;

/// Estimate difficulty (1-5) from the question and its choices.
pub fn estimate_difficulty(candidate: &Candidate) -> u8 {
    let normalized = normalize(&candidate.combined_text());
    let length = normalized.chars().count();
    let markers = markers_present(&normalized);

    let mut score = MIN_DIFFICULTY;
    if length > LONG_TEXT_CHARS {
        score += 1;
    }
    if length > VERY_LONG_TEXT_CHARS {
        score += 1;
    }
    if markers.contains(&MarkerKind::Negation) {
        score += 1;
    }
    if markers.contains(&MarkerKind::Scenario) {
        score += 1;
    }

    score.min(MAX_DIFFICULTY)
}

/// Both the heuristic and the reported difficulty must reach `floor`.
pub fn meets_floor(heuristic: u8, reported: u8, floor: u8) -> bool {
    heuristic >= floor && reported >= floor
}
