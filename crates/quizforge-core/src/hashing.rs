//! Deterministic content keys.
//!
//! Keys are BLAKE3 over length-prefixed fields, hex encoded, so they are
//! stable across processes and safe to use as file names.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Language;

/// Key of one cached pipeline result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a paragraph under its detected language, article and topics.
    pub fn for_paragraph(
        paragraph: &str,
        language: Language,
        article_ref: Option<&str>,
        tags: &[String],
    ) -> Self {
        let mut fields: Vec<&str> = vec![paragraph, language.code(), article_ref.unwrap_or("")];
        fields.extend(tags.iter().map(String::as_str));
        Self(hash_fields(&fields))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex BLAKE3 digest of `fields`, each prefixed by its byte length.
///
/// Prefixing keeps `["ab", "c"]` and `["a", "bc"]` apart.
#[inline]
pub fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(&(fields.len() as u64).to_le_bytes());
    for field in fields {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Stable 64-bit value derived from `seed`, used for deterministic picks.
#[inline]
pub fn seed_to_u64(seed: &str) -> u64 {
    let hash = blake3::hash(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}
