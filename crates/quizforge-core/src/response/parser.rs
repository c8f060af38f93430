//! Turn raw model replies into typed values.

use serde::de::DeserializeOwned;

use super::schema::{validate_response, ResponseKind};
use crate::types::{Candidate, VerificationOutcome};
use crate::ValidationError;

/// Parse a JSON object out of a model's text reply.
///
/// Tolerates a surrounding markdown code fence and leading or trailing
/// prose around the outermost `{ ... }`.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, ValidationError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return ensure_object(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            let value = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end])
                .map_err(|e| ValidationError::Malformed(e.to_string()))?;
            ensure_object(value)
        }
        _ => Err(ValidationError::Malformed(
            "reply does not contain a JSON object".to_string(),
        )),
    }
}

fn ensure_object(value: serde_json::Value) -> Result<serde_json::Value, ValidationError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(ValidationError::Malformed(
            "reply is JSON but not an object".to_string(),
        ))
    }
}

fn parse_checked<T: DeserializeOwned>(
    kind: ResponseKind,
    reply: &serde_json::Value,
) -> Result<T, ValidationError> {
    validate_response(kind, reply).map_err(ValidationError::Schema)?;
    serde_json::from_value(reply.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Validate a generator reply and deserialize it.
pub fn parse_candidate(reply: &serde_json::Value) -> Result<Candidate, ValidationError> {
    let mut candidate: Candidate = parse_checked(ResponseKind::Candidate, reply)?;
    candidate.question_text = candidate.question_text.trim().to_string();
    candidate.correct_label = candidate.correct_label.trim().to_string();
    for choice in &mut candidate.choices {
        choice.label = choice.label.trim().to_string();
        choice.text = choice.text.trim().to_string();
    }
    Ok(candidate)
}

/// Validate a verifier reply and deserialize it.
pub fn parse_verification(reply: &serde_json::Value) -> Result<VerificationOutcome, ValidationError> {
    parse_checked(ResponseKind::Verification, reply)
}
