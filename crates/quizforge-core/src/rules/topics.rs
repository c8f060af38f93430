//! Topic tagging by ordered rule table.

use lazy_static::lazy_static;
use regex::Regex;

use crate::text::normalize;

/// Tag used when no rule matches.
pub const GENERAL_TOPIC: &str = "general";

lazy_static! {
    /// `(tag, pattern)` rows, matched against normalized text in order.
    pub static ref TOPIC_RULES: Vec<(&'static str, Regex)> = vec![
        ("consent", Regex::new(r"\b(consent\w*|zgod\w*)\b").unwrap()),
        (
            "lawful_basis",
            Regex::new(r"\b(lawful basis|legitimate interests?|legal obligation|podstaw\w* prawn\w*|prawnie uzasadnion\w*)\b").unwrap(),
        ),
        (
            "data_subject_rights",
            Regex::new(r"\b(right to|erasure|rectification|portability|access request|prawo do|prawa osob\w*|sprostowani\w*|usuniecia|przenoszenia)\b").unwrap(),
        ),
        (
            "controller_obligations",
            Regex::new(r"\b(controllers?|accountability|records of processing|administrator\w*|rozliczalnosc\w*|rejestr\w* czynnosci)\b").unwrap(),
        ),
        (
            "security",
            Regex::new(r"\b(security|encryption|pseudonymi[sz]ation|bezpieczenstw\w*|szyfrowani\w*|pseudonimizacj\w*)\b").unwrap(),
        ),
        (
            "data_breach",
            Regex::new(r"\b(breach\w*|naruszeni\w* ochrony)\b").unwrap(),
        ),
        (
            "dpo",
            Regex::new(r"\b(data protection officer|dpo|inspektor\w* ochrony danych|iod)\b").unwrap(),
        ),
        (
            "international_transfers",
            Regex::new(r"\b(transfers?|third countr\w*|przekazywani\w*|panstw\w* trzeci\w*)\b").unwrap(),
        ),
        (
            "penalties",
            Regex::new(r"\b(fines?|penalt\w*|kara|kary|karze|sankcj\w*)\b").unwrap(),
        ),
    ];
}

/// Topic tags for `text`, in table order, or `["general"]`.
pub fn tag_topics(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let tags: Vec<String> = TOPIC_RULES
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&normalized))
        .map(|(tag, _)| tag.to_string())
        .collect();

    if tags.is_empty() {
        vec![GENERAL_TOPIC.to_string()]
    } else {
        tags
    }
}

/// Whether `tag` is a known topic (including `general`).
pub fn is_known_topic(tag: &str) -> bool {
    tag == GENERAL_TOPIC || TOPIC_RULES.iter().any(|(t, _)| *t == tag)
}
