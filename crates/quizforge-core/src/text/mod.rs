//! Text comparison substrate.
//!
//! Everything here works on normalized text. Normalized text is used for
//! comparisons only and is never shown to a quiz taker.

pub mod normalize;
pub mod overlap;

pub use normalize::{normalize, tokens};
pub use overlap::{ngrams, overlap_score, DEFAULT_NGRAM_SIZE};
