//! Prompts for the generator and verifier models.
//!
//! The system prompts are fixed text; the user messages carry the
//! paragraph, hints and feedback for one attempt.

use quizforge_core::{Candidate, Language};

use crate::providers::ChatMessage;

/// Style examples shown to the generator.
pub const MAX_STYLE_EXAMPLES: usize = 3;

pub const GENERATOR_SYSTEM_PROMPT: &str = r#"
You write multiple-choice exam questions about data protection law.

Each question tests understanding of ONE source paragraph.

## Rules
1. Exactly four choices labelled A, B, C and D
2. Exactly one choice is correct; the other three are plausible but wrong
3. Do not copy phrases of five or more words from the paragraph
4. Prefer applied questions (a short scenario) over recall of wording
5. Choices must be distinct in meaning, not just in wording
6. The rationale explains briefly why the correct choice is right
7. Set needs_human_review to true if the paragraph is ambiguous

## Difficulty (1-5)
1 = recall of a single fact, 3 = applying a rule to a case,
5 = distinguishing close exceptions. Rate honestly.

Reply with a single JSON object matching the provided schema.
"#;

pub const VERIFIER_SYSTEM_PROMPT: &str = r#"
You review multiple-choice exam questions against their source paragraph.

Check independently:
1. The marked answer is correct according to the paragraph
2. No other choice is also defensible
3. The question is answerable from the paragraph alone
4. The wording is unambiguous

Set ok to false if any check fails and list each problem in issues.
Set needs_human_review to true when you are unsure.
confidence is your confidence in your own verdict, from 0 to 1.

Reply with a single JSON object matching the provided schema.
"#;

/// Extra steering for one generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationHints {
    /// Topic the question should focus on
    pub focus_topic: Option<String>,
    /// Difficulty the generator should aim for
    pub target_difficulty: Option<u8>,
    /// Opaque seed, varies the request between batch slots
    pub seed: Option<String>,
}

/// Everything one generation prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub paragraph: &'a str,
    pub language: Language,
    pub article_ref: Option<&'a str>,
    pub topics: &'a [String],
    pub style_examples: &'a [String],
    pub hints: &'a GenerationHints,
    /// What was wrong with the previous attempt
    pub feedback: Option<&'a str>,
}

pub fn generation_messages(ctx: &GenerationContext<'_>) -> Vec<ChatMessage> {
    let mut user = format!(
        "Write the question in {} ({}).\n",
        ctx.language.display_name(),
        ctx.language.code()
    );
    if let Some(article) = ctx.article_ref {
        user.push_str(&format!("Source: {}\n", article));
    }
    if !ctx.topics.is_empty() {
        user.push_str(&format!("Topics: {}\n", ctx.topics.join(", ")));
    }
    if let Some(topic) = &ctx.hints.focus_topic {
        user.push_str(&format!("Focus on the topic: {}\n", topic));
    }
    if let Some(difficulty) = ctx.hints.target_difficulty {
        user.push_str(&format!("Aim for difficulty {}.\n", difficulty));
    }
    if let Some(seed) = &ctx.hints.seed {
        user.push_str(&format!("Variation key: {}\n", seed));
    }

    user.push_str("\n## Paragraph\n");
    user.push_str(ctx.paragraph.trim());
    user.push('\n');

    if !ctx.style_examples.is_empty() {
        user.push_str("\n## Existing questions (match their style, do not repeat them)\n");
        for example in ctx.style_examples.iter().take(MAX_STYLE_EXAMPLES) {
            user.push_str(&format!("- {}\n", example.trim()));
        }
    }

    if let Some(feedback) = ctx.feedback {
        user.push_str("\n## Your previous attempt was rejected\n");
        user.push_str(feedback);
        user.push_str("\nWrite a new question that avoids this problem.\n");
    }

    vec![
        ChatMessage::system(GENERATOR_SYSTEM_PROMPT.trim()),
        ChatMessage::user(user),
    ]
}

pub fn verification_messages(
    paragraph: &str,
    candidate: &Candidate,
    language: Language,
) -> Vec<ChatMessage> {
    let mut user = format!(
        "The question is written in {}.\n\n## Paragraph\n{}\n\n## Question\n{}\n",
        language.display_name(),
        paragraph.trim(),
        candidate.question_text
    );
    for choice in candidate.choices_by_label() {
        user.push_str(&format!("{}) {}\n", choice.label, choice.text));
    }
    user.push_str(&format!(
        "\nMarked correct: {}\nRationale: {}\n",
        candidate.correct_label, candidate.rationale
    ));

    vec![
        ChatMessage::system(VERIFIER_SYSTEM_PROMPT.trim()),
        ChatMessage::user(user),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::Choice;

    #[test]
    fn test_generator_prompt_has_key_rules() {
        assert!(GENERATOR_SYSTEM_PROMPT.contains("four choices"));
        assert!(GENERATOR_SYSTEM_PROMPT.contains("five or more words"));
        assert!(GENERATOR_SYSTEM_PROMPT.contains("JSON"));
    }

    #[test]
    fn test_generation_messages_include_context() {
        let hints = GenerationHints {
            focus_topic: Some("consent".to_string()),
            target_difficulty: Some(4),
            seed: None,
        };
        let examples: Vec<String> = (0..5).map(|i| format!("Example {}?", i)).collect();
        let topics = vec!["consent".to_string()];
        let messages = generation_messages(&GenerationContext {
            paragraph: "  Consent must be freely given.  ",
            language: Language::En,
            article_ref: Some("Art. 7"),
            topics: &topics,
            style_examples: &examples,
            hints: &hints,
            feedback: Some("overlap: copied the paragraph"),
        });

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        let user = &messages[1].content;
        assert!(user.contains("English (en)"));
        assert!(user.contains("Source: Art. 7"));
        assert!(user.contains("Focus on the topic: consent"));
        assert!(user.contains("Aim for difficulty 4."));
        assert!(user.contains("Consent must be freely given.\n"));
        assert!(user.contains("Example 2?"));
        assert!(!user.contains("Example 3?"));
        assert!(user.contains("overlap: copied the paragraph"));
    }

    #[test]
    fn test_first_attempt_has_no_feedback_section() {
        let hints = GenerationHints::default();
        let messages = generation_messages(&GenerationContext {
            paragraph: "Text.",
            language: Language::Pl,
            article_ref: None,
            topics: &[],
            style_examples: &[],
            hints: &hints,
            feedback: None,
        });
        assert!(!messages[1].content.contains("rejected"));
        assert!(messages[1].content.contains("Polish (pl)"));
    }

    #[test]
    fn test_verification_lists_choices_in_label_order() {
        let candidate = Candidate {
            question_text: "Who?".to_string(),
            choices: vec![
                Choice::new("B", "Processor"),
                Choice::new("A", "Controller"),
                Choice::new("D", "Court"),
                Choice::new("C", "Authority"),
            ],
            correct_label: "A".to_string(),
            rationale: "Art. 24".to_string(),
            difficulty: 2,
            tags: vec![],
            needs_human_review: false,
        };
        let messages = verification_messages("Paragraph.", &candidate, Language::En);
        let user = &messages[1].content;
        let a = user.find("A) Controller").unwrap();
        let d = user.find("D) Court").unwrap();
        assert!(a < d);
        assert!(user.contains("Marked correct: A"));
    }
}
