//! Data model shared by the gates, the runtime and the batch generator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Languages the generator and the rule tables support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Pl,
    En,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Pl => "pl",
            Language::En => "en",
        }
    }

    /// Human-readable name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Pl => "Polish",
            Language::En => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pl" => Ok(Language::Pl),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{}': expected 'pl' or 'en'", other)),
        }
    }
}

/// One answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Expected to be one of A, B, C, D
    pub label: String,

    /// Option text as shown to the quiz taker
    pub text: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// A generated question that has not passed the gates yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "question")]
    pub question_text: String,

    #[serde(default)]
    pub choices: Vec<Choice>,

    pub correct_label: String,

    #[serde(alias = "rationale_short")]
    pub rationale: String,

    /// Difficulty reported by the generator (1-5)
    pub difficulty: u8,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub needs_human_review: bool,
}

impl Candidate {
    /// Look up a choice by label.
    pub fn choice(&self, label: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.label.trim() == label)
    }

    /// Question followed by every choice text, space separated.
    pub fn combined_text(&self) -> String {
        let mut text = self.question_text.clone();
        for choice in &self.choices {
            text.push(' ');
            text.push_str(&choice.text);
        }
        text
    }

    /// Choices ordered by label (A..D).
    pub fn choices_by_label(&self) -> Vec<&Choice> {
        let mut ordered: Vec<&Choice> = self.choices.iter().collect();
        ordered.sort_by(|a, b| a.label.trim().cmp(b.label.trim()));
        ordered
    }

    /// Zero-based index of the correct answer in label order.
    pub fn correct_index(&self) -> Option<usize> {
        self.choices_by_label()
            .iter()
            .position(|c| c.label.trim() == self.correct_label.trim())
    }
}

/// Verdict of the independent verifier model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub ok: bool,

    #[serde(default)]
    pub issues: Vec<String>,

    #[serde(default)]
    pub needs_human_review: bool,

    /// Verifier confidence in its own verdict (0.0 - 1.0)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// What the similarity gate wants done with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityAction {
    Accept,
    Revise,
    Reject,
}

impl fmt::Display for SimilarityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityAction::Accept => f.write_str("accept"),
            SimilarityAction::Revise => f.write_str("revise"),
            SimilarityAction::Reject => f.write_str("reject"),
        }
    }
}

/// A corpus entry close to the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub text: String,
    pub cosine: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityAssessment {
    pub action: SimilarityAction,
    pub reason: String,
    /// `None` when the corpus was empty and the check was skipped
    pub max_cosine_to_any_existing: Option<f32>,
    #[serde(default)]
    pub top_matches: Vec<SimilarityMatch>,
}

/// An accepted question, as cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub language: Language,
    pub article_ref: Option<String>,
    #[serde(flatten)]
    pub candidate: Candidate,
    pub heuristic_difficulty: u8,
    pub verification: VerificationOutcome,
    pub overlap_score: f64,
    pub similarity: SimilarityAssessment,
}

/// An existing bank question, either a bare string or an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExistingQuestion {
    Text(String),
    Object {
        #[serde(default)]
        question: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

impl ExistingQuestion {
    /// The question text, if the entry carries any non-blank text.
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            ExistingQuestion::Text(t) => Some(t.as_str()),
            ExistingQuestion::Object { question, text } => {
                question.as_deref().or(text.as_deref())
            }
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// Existing questions the candidate is compared against for style.
///
/// Holds at most `limit` texts, sampled evenly from the supplied corpus.
/// Embeddings, when present, are aligned with `texts`.
#[derive(Debug, Clone, Default)]
pub struct StyleCorpus {
    texts: Vec<String>,
    embeddings: Option<Arc<Vec<Vec<f32>>>>,
}

impl StyleCorpus {
    /// Build a corpus from raw texts, keeping an even sample of at most `limit`.
    pub fn sampled(texts: Vec<String>, limit: usize) -> Self {
        let texts: Vec<String> = texts.into_iter().filter(|t| !t.trim().is_empty()).collect();
        let texts = if texts.len() <= limit {
            texts
        } else {
            sample_evenly(texts.len(), limit)
                .into_iter()
                .map(|i| texts[i].clone())
                .collect()
        };
        Self {
            texts,
            embeddings: None,
        }
    }

    /// Attach precomputed embeddings. Ignored unless one per text.
    pub fn with_embeddings(mut self, embeddings: Vec<Vec<f32>>) -> Self {
        if embeddings.len() == self.texts.len() {
            self.embeddings = Some(Arc::new(embeddings));
        } else {
            tracing::warn!(
                texts = self.texts.len(),
                embeddings = embeddings.len(),
                "Embedding count does not match corpus size, ignoring precomputed embeddings"
            );
        }
        self
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn embeddings(&self) -> Option<&[Vec<f32>]> {
        self.embeddings.as_deref().map(|e| e.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }
}

/// Evenly spaced indices `0..len`, at most `limit` of them.
pub fn sample_evenly(len: usize, limit: usize) -> Vec<usize> {
    if len <= limit {
        return (0..len).collect();
    }
    (0..limit).map(|i| i * len / limit).collect()
}

/// Input to one pipeline invocation.
#[derive(Debug, Clone)]
pub struct SourceParagraph {
    pub text: String,
    pub declared_language: Option<Language>,
    pub article_ref: Option<String>,
    pub existing_question_corpus: StyleCorpus,
}

impl SourceParagraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            declared_language: None,
            article_ref: None,
            existing_question_corpus: StyleCorpus::default(),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.declared_language = Some(language);
        self
    }

    pub fn with_article_ref(mut self, article_ref: impl Into<String>) -> Self {
        self.article_ref = Some(article_ref.into());
        self
    }

    pub fn with_corpus(mut self, corpus: StyleCorpus) -> Self {
        self.existing_question_corpus = corpus;
        self
    }
}
