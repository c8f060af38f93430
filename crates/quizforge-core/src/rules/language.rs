//! Language detection by weighted rule table.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::text::normalize;
use crate::types::Language;

/// Which form of the text a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    /// Lower-cased input, diacritics intact
    Raw,
    /// Output of [`normalize`]
    Normalized,
}

#[derive(Debug)]
pub struct LanguageRule {
    pub language: Language,
    pub weight: u32,
    pub target: RuleTarget,
    pub pattern: Regex,
}

fn rule(language: Language, weight: u32, target: RuleTarget, pattern: &str) -> LanguageRule {
    LanguageRule {
        language,
        weight,
        target,
        pattern: Regex::new(pattern).unwrap(),
    }
}

lazy_static! {
    pub static ref LANGUAGE_RULES: Vec<LanguageRule> = vec![
        // Polish letters never occur in English prose
        rule(Language::Pl, 3, RuleTarget::Raw, r"[ąćęłńóśźż]"),
        rule(
            Language::Pl,
            1,
            RuleTarget::Normalized,
            r"\b(i|w|z|na|sie|nie|jest|sa|do|oraz|ze|przez|dla|ktory|ktora|ktore|lub|jak|danych|osobowych)\b",
        ),
        rule(
            Language::En,
            1,
            RuleTarget::Normalized,
            r"\b(the|and|of|is|are|in|for|that|with|by|which|or|be|shall|data|personal)\b",
        ),
    ];
}

/// Per-language score for `text`.
pub fn language_scores(text: &str) -> BTreeMap<Language, u32> {
    let raw = text.to_lowercase();
    let normalized = normalize(text);
    let mut scores = BTreeMap::new();

    for rule in LANGUAGE_RULES.iter() {
        let haystack = match rule.target {
            RuleTarget::Raw => raw.as_str(),
            RuleTarget::Normalized => normalized.as_str(),
        };
        let hits = rule.pattern.find_iter(haystack).count() as u32;
        if hits > 0 {
            *scores.entry(rule.language).or_insert(0) += hits * rule.weight;
        }
    }

    scores
}

/// Best-scoring language, or `None` when there is no signal or a tie.
pub fn detect_language(text: &str) -> Option<Language> {
    let scores = language_scores(text);
    let mut ranked: Vec<(Language, u32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    match ranked.as_slice() {
        [] => None,
        [(lang, _)] => Some(*lang),
        [(lang, top), (_, second), ..] if top > second => Some(*lang),
        _ => None,
    }
}

/// Declared language if given, else detected, else `fallback`.
pub fn resolve_language(declared: Option<Language>, text: &str, fallback: Language) -> Language {
    declared
        .or_else(|| detect_language(text))
        .unwrap_or(fallback)
}
