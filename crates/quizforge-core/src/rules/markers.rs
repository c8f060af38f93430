//! Difficulty markers.
//!
//! Negation/exception wording and scenario/role framing both make a
//! question harder to answer. Patterns are matched against normalized
//! text, so they are written without diacritics.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::Language;

/// What a marker pattern signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Negation,
    Scenario,
}

/// One row of the marker table.
#[derive(Debug)]
pub struct MarkerRule {
    pub kind: MarkerKind,
    pub language: Language,
    pub pattern: Regex,
}

fn rule(kind: MarkerKind, language: Language, pattern: &str) -> MarkerRule {
    MarkerRule {
        kind,
        language,
        pattern: Regex::new(pattern).unwrap(),
    }
}

lazy_static! {
    /// Ordered marker table, English rows first.
    pub static ref MARKER_RULES: Vec<MarkerRule> = vec![
        rule(
            MarkerKind::Negation,
            Language::En,
            r"\b(not|except|unless|never|incorrect|false|cannot|least|neither|nor)\b",
        ),
        rule(
            MarkerKind::Scenario,
            Language::En,
            r"\b(scenario|suppose|assume|imagine|company|employee|employer|customer|hospital|controller|processor)\b",
        ),
        rule(
            MarkerKind::Negation,
            Language::Pl,
            r"\b(nie|z wyjatkiem|chyba ze|oprocz|nieprawdziwe|nieprawidlowe|bledne|nigdy|zadne)\b",
        ),
        rule(
            MarkerKind::Scenario,
            Language::Pl,
            r"\b(scenariusz\w*|zalozmy|wyobraz|firma|firmy|spolka|spolki|pracownik\w*|pracodawca|klient\w*|szpital\w*|administrator\w*|podmiot przetwarzajacy)\b",
        ),
    ];
}

/// Marker kinds present in already-normalized text.
pub fn markers_present(normalized: &str) -> BTreeSet<MarkerKind> {
    MARKER_RULES
        .iter()
        .filter(|r| r.pattern.is_match(normalized))
        .map(|r| r.kind)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize;

    #[test]
    fn test_english_negation() {
        let found = markers_present(&normalize("Which of the following is NOT a lawful basis?"));
        assert!(found.contains(&MarkerKind::Negation));
        assert!(!found.contains(&MarkerKind::Scenario));
    }

    #[test]
    fn test_polish_exception() {
        let found = markers_present(&normalize("Wszystkie są prawdziwe, z wyjątkiem:"));
        assert!(found.contains(&MarkerKind::Negation));
    }

    #[test]
    fn test_scenario_in_both_languages() {
        assert!(markers_present(&normalize("Suppose a hospital shares records"))
            .contains(&MarkerKind::Scenario));
        assert!(markers_present(&normalize("Spółka przekazuje dane pracowników"))
            .contains(&MarkerKind::Scenario));
    }

    #[test]
    fn test_plain_question_has_no_markers() {
        assert!(markers_present(&normalize("What does GDPR stand for?")).is_empty());
    }

    #[test]
    fn test_every_language_has_both_kinds() {
        for language in [Language::En, Language::Pl] {
            for kind in [MarkerKind::Negation, MarkerKind::Scenario] {
                assert!(MARKER_RULES
                    .iter()
                    .any(|r| r.language == language && r.kind == kind));
            }
        }
    }
}
