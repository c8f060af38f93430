//! Pipeline configuration.
//!
//! Every threshold ships with a default. A YAML file may override any
//! subset of fields, and the model names and base URL may be overridden
//! from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use quizforge_core::{Language, LocalGateConfig, SimilarityThresholds};

use crate::resilience::RetryPolicy;

/// API key for the OpenAI-compatible endpoint.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const GENERATOR_MODEL_ENV: &str = "QUIZFORGE_GENERATOR_MODEL";
pub const VERIFIER_MODEL_ENV: &str = "QUIZFORGE_VERIFIER_MODEL";
pub const EMBEDDING_MODEL_ENV: &str = "QUIZFORGE_EMBEDDING_MODEL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde adapter for durations written as `"500ms"`, `"2m"`, `"120s"`.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Model names and request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub generator: String,
    pub verifier: String,
    pub embedding: String,
    pub base_url: String,

    /// Sampling temperature for the generator
    pub generator_temperature: f32,

    /// Sampling temperature for the verifier
    pub verifier_temperature: f32,

    pub max_tokens: u32,

    /// Per-request HTTP timeout
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            generator: "gpt-4o-mini".to_string(),
            verifier: "gpt-4o-mini".to_string(),
            embedding: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            generator_temperature: 0.7,
            verifier_temperature: 0.0,
            max_tokens: 800,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the orchestrator needs besides a provider and a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overlap threshold, n-gram size and difficulty floor
    pub gates: LocalGateConfig,

    pub similarity: SimilarityThresholds,

    /// Candidates tried before giving up
    pub semantic_attempts: u32,

    /// Retry policy for each remote call
    pub retry: RetryPolicy,

    /// Bound on one whole pipeline run
    #[serde(with = "duration_str")]
    pub deadline: Duration,

    /// Coalesce concurrent runs for the same cache key
    pub single_flight: bool,

    /// Used when a paragraph's language is neither declared nor detectable
    pub default_language: Language,

    pub models: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gates: LocalGateConfig::default(),
            similarity: SimilarityThresholds::default(),
            semantic_attempts: 3,
            retry: RetryPolicy::default(),
            deadline: Duration::from_secs(120),
            single_flight: true,
            default_language: Language::Pl,
            models: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Apply model and base URL overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(GENERATOR_MODEL_ENV) {
            self.models.generator = model;
        }
        if let Some(model) = get(VERIFIER_MODEL_ENV) {
            self.models.verifier = model;
        }
        if let Some(model) = get(EMBEDDING_MODEL_ENV) {
            self.models.embedding = model;
        }
        if let Some(url) = get(OPENAI_BASE_URL_ENV) {
            self.models.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    /// Reject settings that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.gates.overlap_threshold) {
            return Err(ConfigError::Invalid(format!(
                "gates.overlap_threshold must be within [0, 1], got {}",
                self.gates.overlap_threshold
            )));
        }
        if self.gates.ngram_size == 0 {
            return Err(ConfigError::Invalid(
                "gates.ngram_size must be at least 1".to_string(),
            ));
        }
        if !(1..=5).contains(&self.gates.difficulty_floor) {
            return Err(ConfigError::Invalid(format!(
                "gates.difficulty_floor must be within 1..=5, got {}",
                self.gates.difficulty_floor
            )));
        }
        self.similarity.validate().map_err(ConfigError::Invalid)?;
        if self.semantic_attempts == 0 {
            return Err(ConfigError::Invalid(
                "semantic_attempts must be at least 1".to_string(),
            ));
        }
        self.retry.validate().map_err(ConfigError::Invalid)?;
        if self.deadline.is_zero() {
            return Err(ConfigError::Invalid("deadline must be positive".to_string()));
        }
        let url = &self.models.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "models.base_url must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.semantic_attempts, 3);
        assert_eq!(config.deadline, Duration::from_secs(120));
        assert_eq!(config.gates.overlap_threshold, 0.25);
        assert_eq!(config.gates.ngram_size, 5);
        assert_eq!(config.gates.difficulty_floor, 2);
        assert!(config.single_flight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
semantic_attempts: 5
deadline: 90s
retry:
  base_delay: 250ms
similarity:
  duplicate: 0.95
models:
  generator: gpt-4o
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.semantic_attempts, 5);
        assert_eq!(config.deadline, Duration::from_secs(90));
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.similarity.duplicate, 0.95);
        assert_eq!(config.similarity.too_far, 0.55);
        assert_eq!(config.models.generator, "gpt-4o");
        assert_eq!(config.models.verifier, "gpt-4o-mini");
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let yaml = r#"
similarity:
  target_min: 0.9
  target_max: 0.7
"#;
        assert!(matches!(
            PipelineConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(PipelineConfig::from_yaml_str("semantic_attempts: 0").is_err());
    }

    #[test]
    fn test_bad_duration_is_yaml_error() {
        assert!(matches!(
            PipelineConfig::from_yaml_str("deadline: soon"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (GENERATOR_MODEL_ENV, "gen-model"),
            (VERIFIER_MODEL_ENV, "  "),
            (EMBEDDING_MODEL_ENV, "embed-model"),
            (OPENAI_BASE_URL_ENV, "http://localhost:9000/v1/"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::default()
            .with_overrides_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.models.generator, "gen-model");
        assert_eq!(config.models.verifier, "gpt-4o-mini");
        assert_eq!(config.models.embedding, "embed-model");
        assert_eq!(config.models.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn test_durations_serialize_human_readable() {
        let yaml = serde_yaml::to_string(&PipelineConfig::default()).unwrap();
        assert!(yaml.contains("deadline: 2m"));
        assert!(yaml.contains("base_delay: 500ms"));
    }
}
