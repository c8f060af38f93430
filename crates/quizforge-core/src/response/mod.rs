//! Model response contracts.
//!
//! Generator and verifier replies must match the JSON Schemas under
//! `schemas/` before they are deserialized. The same schemas are sent to
//! the model as its structured-output format.

pub mod parser;
pub mod schema;

pub use parser::{extract_json_object, parse_candidate, parse_verification};
pub use schema::{response_schema, validate_response, ResponseKind, SchemaError};
