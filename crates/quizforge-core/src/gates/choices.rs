//! Structural checks on the four answer options.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::text::normalize;
use crate::types::Candidate;

/// The only labels a choice may carry.
pub const CHOICE_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// A structural defect in a candidate's choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceIssue {
    /// Choices absent or not exactly four
    ChoicesMissing,
    /// Fewer than four distinct labels
    DuplicateLabels,
    /// A label outside A-D
    LabelOutOfRange,
    /// Fewer than four distinct normalized texts
    DuplicateChoiceTexts,
    CorrectLabelNotInChoices,
}

impl ChoiceIssue {
    pub fn code(&self) -> &'static str {
        match self {
            ChoiceIssue::ChoicesMissing => "choices_missing",
            ChoiceIssue::DuplicateLabels => "duplicate_labels",
            ChoiceIssue::LabelOutOfRange => "label_out_of_range",
            ChoiceIssue::DuplicateChoiceTexts => "duplicate_choice_texts",
            ChoiceIssue::CorrectLabelNotInChoices => "correct_label_not_in_choices",
        }
    }
}

impl fmt::Display for ChoiceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Every independent issue found in `candidate`'s choices.
///
/// An empty vector means the choices are valid. When the choice count is
/// wrong nothing else is checked.
pub fn check_choices(candidate: &Candidate) -> Vec<ChoiceIssue> {
    let choices = &candidate.choices;
    if choices.len() != CHOICE_LABELS.len() {
        return vec![ChoiceIssue::ChoicesMissing];
    }

    let mut issues = Vec::new();

    let labels: HashSet<&str> = choices.iter().map(|c| c.label.trim()).collect();
    if labels.len() < CHOICE_LABELS.len() {
        issues.push(ChoiceIssue::DuplicateLabels);
    }
    if labels.iter().any(|l| !CHOICE_LABELS.contains(l)) {
        issues.push(ChoiceIssue::LabelOutOfRange);
    }

    let texts: HashSet<String> = choices.iter().map(|c| normalize(&c.text)).collect();
    if texts.len() < CHOICE_LABELS.len() {
        issues.push(ChoiceIssue::DuplicateChoiceTexts);
    }

    if !labels.contains(candidate.correct_label.trim()) {
        issues.push(ChoiceIssue::CorrectLabelNotInChoices);
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Choice;

    fn candidate(choices: &[(&str, &str)], correct: &str) -> Candidate {
        Candidate {
            question_text: "Who appoints the data protection officer?".to_string(),
            choices: choices.iter().map(|(l, t)| Choice::new(*l, *t)).collect(),
            correct_label: correct.to_string(),
            rationale: "r".to_string(),
            difficulty: 3,
            tags: vec![],
            needs_human_review: false,
        }
    }

    #[test]
    fn test_valid_choices() {
        let c = candidate(
            &[("A", "Controller"), ("B", "Processor"), ("C", "Authority"), ("D", "Court")],
            "A",
        );
        assert!(check_choices(&c).is_empty());
    }

    #[test]
    fn test_duplicate_label_and_missing_correct() {
        let c = candidate(
            &[("A", "One"), ("A", "Two"), ("C", "Three"), ("D", "Four")],
            "B",
        );
        assert_eq!(
            check_choices(&c),
            vec![ChoiceIssue::DuplicateLabels, ChoiceIssue::CorrectLabelNotInChoices]
        );
    }

    #[test]
    fn test_wrong_count_short_circuits() {
        let c = candidate(&[("A", "One"), ("B", "One")], "Z");
        assert_eq!(check_choices(&c), vec![ChoiceIssue::ChoicesMissing]);

        let c = candidate(&[], "A");
        assert_eq!(check_choices(&c), vec![ChoiceIssue::ChoicesMissing]);
    }

    #[test]
    fn test_texts_compared_after_normalization() {
        let c = candidate(
            &[("A", "Zgoda"), ("B", "ZGODA!"), ("C", "Umowa"), ("D", "Interes")],
            "C",
        );
        assert_eq!(check_choices(&c), vec![ChoiceIssue::DuplicateChoiceTexts]);
    }

    #[test]
    fn test_label_out_of_range() {
        let c = candidate(&[("A", "1"), ("B", "2"), ("C", "3"), ("E", "4")], "A");
        assert_eq!(check_choices(&c), vec![ChoiceIssue::LabelOutOfRange]);
    }

    #[test]
    fn test_issue_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ChoiceIssue::CorrectLabelNotInChoices).unwrap();
        assert_eq!(json, "\"correct_label_not_in_choices\"");
    }
}
