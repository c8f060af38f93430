//! Persistent per-slot cache for batch runs.
//!
//! One JSON file per key under the cache directory. Writes go to a
//! temporary file that is renamed into place, so a crashed run never
//! leaves a half-written entry.

use std::path::{Path, PathBuf};

use quizforge_core::hashing::hash_fields;

use super::artifact::BatchItem;
use super::BatchError;

/// What a batch slot's cached item depends on, besides the models.
#[derive(Debug, Clone, Copy)]
pub struct SlotKey<'a> {
    pub seed: &'a str,
    pub topic: &'a str,
    pub difficulty: &'a str,
    /// Declared batch language, or "auto"
    pub language: &'a str,
    pub knowledge: &'a str,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BatchError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Key for one batch slot under one model setup.
    ///
    /// `knowledge` is the digest of the loaded paragraphs, so editing the
    /// source material invalidates earlier entries.
    pub fn key(slot: &SlotKey<'_>, generator: &str, verifier: &str) -> String {
        hash_fields(&[
            "batch-item",
            slot.seed,
            slot.topic,
            slot.difficulty,
            slot.language,
            slot.knowledge,
            generator,
            verifier,
        ])
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// The cached item, if present and readable.
    ///
    /// A corrupt entry is treated as a miss and will be overwritten.
    pub fn get(&self, key: &str) -> Option<BatchItem> {
        let path = self.path_for(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    pub fn put(&self, key: &str, item: &BatchItem) -> Result<(), BatchError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        let json = serde_json::to_string_pretty(item)
            .map_err(|e| BatchError::Parse { path: path.clone(), message: e.to_string() })?;
        std::fs::write(&tmp, json).map_err(|e| BatchError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| BatchError::io(&path, e))
    }
}
