//! Input files for batch runs: the knowledge source and the style corpus.
//!
//! Both are lists in JSON or YAML; the YAML parser reads either.

use serde::{Deserialize, Serialize};
use std::path::Path;

use quizforge_core::hashing::hash_fields;
use quizforge_core::{tag_topics, ExistingQuestion, Language, SourceParagraph, StyleCorpus};

use super::BatchError;

/// One paragraph of source material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub text: String,
    #[serde(default)]
    pub article_ref: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    /// Tagged from the text when absent
    #[serde(default)]
    pub topics: Vec<String>,
}

impl KnowledgeEntry {
    pub fn covers(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn to_paragraph(&self, fallback_language: Option<Language>, corpus: StyleCorpus) -> SourceParagraph {
        SourceParagraph {
            text: self.text.clone(),
            declared_language: self.language.or(fallback_language),
            article_ref: self.article_ref.clone(),
            existing_question_corpus: corpus,
        }
    }
}

fn read(path: &Path) -> Result<String, BatchError> {
    std::fs::read_to_string(path).map_err(|e| BatchError::io(path, e))
}

fn parse<T: for<'de> Deserialize<'de>>(path: &Path, raw: &str) -> Result<T, BatchError> {
    serde_yaml::from_str(raw).map_err(|e| BatchError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load paragraphs, dropping blank ones and tagging untagged ones.
pub fn load_knowledge(path: &Path) -> Result<Vec<KnowledgeEntry>, BatchError> {
    let entries: Vec<KnowledgeEntry> = parse(path, &read(path)?)?;
    let entries: Vec<KnowledgeEntry> = entries
        .into_iter()
        .filter(|e| !e.text.trim().is_empty())
        .map(|mut e| {
            if e.topics.is_empty() {
                e.topics = tag_topics(&e.text);
            }
            e
        })
        .collect();

    if entries.is_empty() {
        return Err(BatchError::EmptyKnowledgeSource(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), paragraphs = entries.len(), "Loaded knowledge source");
    Ok(entries)
}

/// Digest over every loaded paragraph and its metadata.
pub fn knowledge_digest(entries: &[KnowledgeEntry]) -> String {
    let topic_lists: Vec<String> = entries.iter().map(|e| e.topics.join("\n")).collect();
    let mut fields = Vec::with_capacity(1 + entries.len() * 4);
    fields.push("knowledge");
    for (entry, topics) in entries.iter().zip(&topic_lists) {
        fields.push(entry.text.as_str());
        fields.push(entry.article_ref.as_deref().unwrap_or(""));
        fields.push(entry.language.as_ref().map(Language::code).unwrap_or("auto"));
        fields.push(topics.as_str());
    }
    hash_fields(&fields)
}

/// Load existing questions and sample at most `limit` of them.
pub fn load_style_corpus(path: &Path, limit: usize) -> Result<StyleCorpus, BatchError> {
    let raw: Vec<ExistingQuestion> = parse(path, &read(path)?)?;
    let texts = raw
        .iter()
        .filter_map(ExistingQuestion::text)
        .map(|t| t.trim().to_string())
        .collect();
    Ok(StyleCorpus::sampled(texts, limit))
}

/// Entries covering `topic`, or all entries when none do.
pub fn paragraphs_for_topic<'a>(entries: &'a [KnowledgeEntry], topic: &str) -> Vec<&'a KnowledgeEntry> {
    let matching: Vec<&KnowledgeEntry> = entries.iter().filter(|e| e.covers(topic)).collect();
    if matching.is_empty() {
        entries.iter().collect()
    } else {
        matching
    }
}
