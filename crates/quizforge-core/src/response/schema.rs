//! JSON Schema validation for model replies.

use std::sync::OnceLock;
use thiserror::Error;

const CANDIDATE_SCHEMA_JSON: &str = include_str!("../../schemas/candidate.schema.json");
const VERIFICATION_SCHEMA_JSON: &str = include_str!("../../schemas/verification.schema.json");

type Compiled = Result<(serde_json::Value, jsonschema::Validator), String>;

static CANDIDATE_SCHEMA: OnceLock<Compiled> = OnceLock::new();
static VERIFICATION_SCHEMA: OnceLock<Compiled> = OnceLock::new();

/// Which reply contract to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Candidate,
    Verification,
}

impl ResponseKind {
    /// Schema name sent with structured-output requests.
    pub fn name(&self) -> &'static str {
        match self {
            ResponseKind::Candidate => "question_candidate",
            ResponseKind::Verification => "verification_outcome",
        }
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn compile(raw: &str) -> Compiled {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("Invalid schema JSON: {}", e))?;
    let validator = jsonschema::options()
        .build(&value)
        .map_err(|e| format!("Failed to compile schema: {}", e))?;
    Ok((value, validator))
}

fn compiled(kind: ResponseKind) -> Result<&'static (serde_json::Value, jsonschema::Validator), SchemaError> {
    let slot = match kind {
        ResponseKind::Candidate => CANDIDATE_SCHEMA.get_or_init(|| compile(CANDIDATE_SCHEMA_JSON)),
        ResponseKind::Verification => {
            VERIFICATION_SCHEMA.get_or_init(|| compile(VERIFICATION_SCHEMA_JSON))
        }
    };
    slot.as_ref().map_err(|e| SchemaError::LoadError(e.clone()))
}

/// The raw schema document for `kind`.
pub fn response_schema(kind: ResponseKind) -> Result<&'static serde_json::Value, SchemaError> {
    compiled(kind).map(|(value, _)| value)
}

/// Validate a reply, returning every violation with its instance path.
pub fn validate_response(kind: ResponseKind, reply: &serde_json::Value) -> Result<(), Vec<String>> {
    let (_, validator) = compiled(kind).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(reply)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
