//! The three model calls the pipeline makes: generate, verify, embed.
//!
//! Each call runs under the configured [`RetryPolicy`]. Generator and
//! verifier replies are schema-checked before they are returned; a reply
//! that fails the check is a [`ValidationError`], not a provider error.

use std::sync::Arc;
use thiserror::Error;

use quizforge_core::response::{response_schema, ResponseKind};
use quizforge_core::{
    extract_json_object, parse_candidate, parse_verification, Candidate, ValidationError,
    VerificationOutcome,
};

use crate::config::ModelConfig;
use crate::providers::{
    ChatMessage, EmbeddingRequest, JsonCompletionRequest, ModelProvider, ProviderError,
};
use crate::resilience::{with_retry, LlmUsage, RetryPolicy};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Typed front door to a [`ModelProvider`].
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    models: ModelConfig,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn ModelProvider>, models: ModelConfig, retry: RetryPolicy) -> Self {
        Self {
            provider,
            models,
            retry,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether the provider reports itself usable. Makes no model call.
    pub async fn health_check(&self) -> bool {
        let healthy = self.provider.health_check().await;
        if !healthy {
            tracing::warn!(provider = self.provider.name(), "Provider reports unhealthy");
        }
        healthy
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    /// Ask the generator for a candidate question.
    pub async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        usage: &mut LlmUsage,
    ) -> Result<Candidate, GatewayError> {
        let reply = self
            .complete(
                ResponseKind::Candidate,
                &self.models.generator,
                self.models.generator_temperature,
                messages,
                usage,
            )
            .await?;
        Ok(parse_candidate(&reply)?)
    }

    /// Ask the verifier to check a candidate.
    pub async fn verify(
        &self,
        messages: Vec<ChatMessage>,
        usage: &mut LlmUsage,
    ) -> Result<VerificationOutcome, GatewayError> {
        let reply = self
            .complete(
                ResponseKind::Verification,
                &self.models.verifier,
                self.models.verifier_temperature,
                messages,
                usage,
            )
            .await?;
        Ok(parse_verification(&reply)?)
    }

    /// Embed `texts`, one vector per text.
    pub async fn embed(
        &self,
        texts: Vec<String>,
        usage: &mut LlmUsage,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbeddingRequest {
            model: self.models.embedding.clone(),
            inputs: texts,
        };
        let expected = request.inputs.len();

        let response = with_retry(self.retry, "embed", || self.provider.embed(&request)).await?;
        usage.add(&response.usage, &response.model);

        if response.vectors.len() != expected {
            return Err(ProviderError::Parse(format!(
                "expected {} embeddings, got {}",
                expected,
                response.vectors.len()
            )));
        }
        Ok(response.vectors)
    }

    async fn complete(
        &self,
        kind: ResponseKind,
        model: &str,
        temperature: f32,
        messages: Vec<ChatMessage>,
        usage: &mut LlmUsage,
    ) -> Result<serde_json::Value, GatewayError> {
        let schema = response_schema(kind)
            .map_err(|e| ValidationError::Schema(vec![e.to_string()]))?
            .clone();
        let request = JsonCompletionRequest {
            model: model.to_string(),
            messages,
            schema_name: kind.name(),
            schema,
            temperature,
            max_tokens: self.models.max_tokens,
        };

        let label = match kind {
            ResponseKind::Candidate => "generate",
            ResponseKind::Verification => "verify",
        };
        let completion =
            with_retry(self.retry, label, || self.provider.complete_json(&request)).await?;
        usage.add(&completion.usage, &completion.model);

        Ok(extract_json_object(&completion.content)?)
    }
}
