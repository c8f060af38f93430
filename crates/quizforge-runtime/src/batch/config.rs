use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use quizforge_core::rules::is_known_topic;
use quizforge_core::{Language, SimilarityThresholds};

use crate::config::ConfigError;

/// Difficulty requested for a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyLabel {
    /// Difficulty on the 1-5 scale the generator is asked to aim for.
    pub fn target(&self) -> u8 {
        match self {
            DifficultyLabel::Easy => 2,
            DifficultyLabel::Medium => 3,
            DifficultyLabel::Hard => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLabel::Easy => "easy",
            DifficultyLabel::Medium => "medium",
            DifficultyLabel::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_seed_prefix() -> String {
    "quizforge".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".quizforge-cache")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_concurrency() -> usize {
    4
}

/// Offline batch generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Where the artifact JSON is written
    pub output: PathBuf,

    pub target_count: usize,

    /// Assigned to slots round-robin
    pub topics: Vec<String>,

    #[serde(default)]
    pub difficulty: DifficultyLabel,

    #[serde(default = "default_seed_prefix")]
    pub seed_prefix: String,

    /// JSON or YAML list of paragraphs
    pub knowledge_source: PathBuf,

    /// JSON or YAML list of existing questions
    #[serde(default)]
    pub style_corpus: Option<PathBuf>,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default)]
    pub similarity: SimilarityThresholds,

    /// Pipeline runs per slot before the slot is given up
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_item: u32,

    /// Verifier confidence below this discards the question
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Declared language for paragraphs that do not carry their own
    #[serde(default)]
    pub language: Option<Language>,
}

impl BatchConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count == 0 {
            return Err(ConfigError::Invalid("target_count must be at least 1".to_string()));
        }
        if self.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("topics must not be empty".to_string()));
        }
        if self.max_attempts_per_item == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts_per_item must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        self.similarity.validate().map_err(ConfigError::Invalid)?;

        let unknown = self.unknown_topics();
        if !unknown.is_empty() {
            tracing::warn!(
                topics = ?unknown,
                "Topics not in the tagging table; only paragraphs that list them explicitly will match"
            );
        }
        Ok(())
    }

    /// Configured topics the automatic tagger never assigns.
    pub fn unknown_topics(&self) -> Vec<String> {
        self.topic_list()
            .into_iter()
            .filter(|t| !is_known_topic(t))
            .collect()
    }

    /// Non-blank topics, trimmed.
    pub fn topic_list(&self) -> Vec<String> {
        self.topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}
