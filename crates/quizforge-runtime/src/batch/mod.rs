//! Offline batch generation.
//!
//! Fills `target_count` slots, each with a topic assigned round-robin and
//! a seed derived from the slot index, and writes the accepted questions
//! to a single JSON artifact. Completed slots are kept in an on-disk cache
//! keyed by seed, topic, difficulty, language, knowledge digest and
//! models, so an interrupted run resumes where it stopped.

mod artifact;
mod config;
mod disk_cache;
mod generator;
mod source;

pub use artifact::{
    BatchArtifact, BatchItem, ARTIFACT_VERSION, REVIEW_DIFFICULTY_MISMATCH, REVIEW_FLAGGED,
    REVIEW_VERIFIER_NOTES,
};
pub use config::{BatchConfig, DifficultyLabel};
pub use disk_cache::{DiskCache, SlotKey};
pub use generator::{BatchGenerator, BatchReport, SlotFailure};
pub use source::{knowledge_digest, load_knowledge, load_style_corpus, KnowledgeEntry};

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Knowledge source {} has no paragraphs", .0.display())]
    EmptyKnowledgeSource(PathBuf),

    #[error("Failed to embed the style corpus: {0}")]
    Embedding(#[source] ProviderError),
}

impl BatchError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
