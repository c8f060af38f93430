//! # quizforge-runtime
//!
//! Model-backed question generation for quizforge.
//!
//! `quizforge-core` decides whether a candidate question is acceptable;
//! this crate produces candidates. It talks to the generator, verifier and
//! embedding models, retries transient failures, caches accepted results
//! and drives the generate → validate → verify → deduplicate loop.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quizforge_core::SourceParagraph;
//! use quizforge_runtime::{Orchestrator, OpenAiProvider, PipelineConfig};
//!
//! let config = PipelineConfig::default().with_env_overrides();
//! let provider = OpenAiProvider::from_env(&config.models)?;
//! let orchestrator = Orchestrator::builder(Arc::new(provider))
//!     .config(config)
//!     .build();
//!
//! let run = orchestrator
//!     .run(&SourceParagraph::new("Consent must be freely given..."))
//!     .await?;
//! println!("{}", run.result.candidate.question_text);
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod gateway;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

#[cfg(test)]
mod test_support;

pub use batch::{BatchConfig, BatchError, BatchGenerator, BatchReport};
pub use cache::{NoStore, ResultCache, ResultStore, SingleFlight};
pub use config::{ConfigError, ModelConfig, PipelineConfig};
pub use endpoint::{EndpointResponse, GenerateRequest, GenerationService};
pub use gateway::{GatewayError, ModelGateway};
pub use orchestrator::{
    AttemptFailure, Orchestrator, OrchestratorBuilder, PipelineError, PipelineRun, PipelineState,
};
pub use prompts::GenerationHints;
pub use providers::{ApiCredential, ModelProvider, ProviderError};
pub use resilience::{LlmUsage, RetryPolicy, UsageMeter};

#[cfg(feature = "openai")]
pub use providers::OpenAiProvider;
