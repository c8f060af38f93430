//! Resilience patterns for remote model calls.
//!
//! This module provides:
//! - Bounded retry with exponential backoff and jitter
//! - Token usage and cost accounting

mod budget;
mod retry;

pub use budget::{LlmUsage, UsageMeter};
pub use retry::{with_retry, PolicyBackoff, RetryPolicy, RetryableError};
