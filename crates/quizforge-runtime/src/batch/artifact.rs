use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use quizforge_core::QuestionResult;

use super::config::DifficultyLabel;
use super::BatchError;

pub const ARTIFACT_VERSION: u32 = 1;

/// Review reasons attached to a batch item.
pub const REVIEW_FLAGGED: &str = "flagged_for_review";
pub const REVIEW_DIFFICULTY_MISMATCH: &str = "difficulty_mismatch";
pub const REVIEW_VERIFIER_NOTES: &str = "verifier_notes";

/// One generated question as stored in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub topic: String,
    pub difficulty: DifficultyLabel,
    pub question: String,
    /// Choice texts in label order A-D
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub confidence: f64,
    pub review_reasons: Vec<String>,
    pub seed: String,
}

impl BatchItem {
    /// Convert an accepted pipeline result into an artifact item.
    ///
    /// Returns `None` if the correct label cannot be located, which the
    /// choice gates rule out for any accepted result.
    pub fn from_result(
        id: String,
        topic: String,
        difficulty: DifficultyLabel,
        seed: String,
        result: &QuestionResult,
    ) -> Option<Self> {
        let candidate = &result.candidate;
        let correct_index = candidate.correct_index()?;

        let mut review_reasons = Vec::new();
        if candidate.needs_human_review || result.verification.needs_human_review {
            review_reasons.push(REVIEW_FLAGGED.to_string());
        }
        if candidate.difficulty != difficulty.target() {
            review_reasons.push(REVIEW_DIFFICULTY_MISMATCH.to_string());
        }
        if !result.verification.issues.is_empty() {
            review_reasons.push(REVIEW_VERIFIER_NOTES.to_string());
        }

        Some(Self {
            id,
            topic,
            difficulty,
            question: candidate.question_text.clone(),
            choices: candidate
                .choices_by_label()
                .into_iter()
                .map(|c| c.text.clone())
                .collect(),
            correct_index,
            confidence: result.verification.confidence,
            review_reasons,
            seed,
        })
    }
}

/// The batch output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchArtifact {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<BatchItem>,
}

impl BatchArtifact {
    /// Stamp the items with the current time, sorted by id.
    pub fn new(mut items: Vec<BatchItem>) -> Self {
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            version: ARTIFACT_VERSION,
            generated_at: Utc::now(),
            items,
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BatchError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BatchError::Parse { path: path.to_path_buf(), message: e.to_string() })?;
        std::fs::write(path, json).map_err(|e| BatchError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> BatchItem {
        BatchItem {
            id: id.to_string(),
            topic: "consent".to_string(),
            difficulty: DifficultyLabel::Medium,
            question: "Q?".to_string(),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 0,
            confidence: 0.9,
            review_reasons: vec![],
            seed: "s".to_string(),
        }
    }

    #[test]
    fn test_items_sorted_by_id() {
        let artifact = BatchArtifact::new(vec![item("0002-consent"), item("0000-consent"), item("0001-consent")]);
        let ids: Vec<&str> = artifact.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["0000-consent", "0001-consent", "0002-consent"]);
        assert_eq!(artifact.version, 1);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        BatchArtifact::new(vec![item("0000-consent")]).write_to(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], 1);
        assert_eq!(written["items"][0]["difficulty"], "medium");
        assert!(written["generated_at"].is_string());
    }
}
