//! Heuristic rule tables.
//!
//! Language detection, topic tagging and the difficulty markers are all
//! ordered tables of `(pattern, outcome)` entries evaluated against
//! normalized text. Adding a language or topic means adding rows here,
//! not touching the code that reads them.

pub mod language;
pub mod markers;
pub mod topics;

pub use language::{detect_language, resolve_language};
pub use markers::{markers_present, MarkerKind};
pub use topics::{is_known_topic, tag_topics, GENERAL_TOPIC};
