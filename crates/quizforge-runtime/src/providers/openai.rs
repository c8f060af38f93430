//! OpenAI-compatible provider.
//!
//! Speaks `/chat/completions` with a `json_schema` response format and
//! `/embeddings`. Any server implementing those two endpoints works when
//! `base_url` points at it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    secrets::ApiCredential, ChatMessage, EmbeddingRequest, EmbeddingResponse, JsonCompletion,
    JsonCompletionRequest, ModelProvider, ProviderError, TokenUsage,
};
use crate::config::{ModelConfig, OPENAI_API_KEY_ENV};

/// OpenAI-compatible chat and embedding client.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(
        credential: ApiCredential,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Build from model settings, reading the key from `OPENAI_API_KEY`.
    pub fn from_env(models: &ModelConfig) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Self::new(credential, models.base_url.clone(), models.request_timeout)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    // The schemas use keywords outside the strict subset; replies are
    // validated locally instead.
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<Option<ApiUsage>> for TokenUsage {
    fn from(usage: Option<ApiUsage>) -> Self {
        let usage = usage.unwrap_or_default();
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete_json(
        &self,
        request: &JsonCompletionRequest,
    ) -> Result<JsonCompletion, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name,
                    schema: &request.schema,
                    strict: false,
                },
            },
        };

        let response: ChatResponse = self.post("/chat/completions", &body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("completion has no message content".to_string()))?;

        Ok(JsonCompletion {
            content,
            usage: response.usage.into(),
            model: response.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if request.inputs.is_empty() {
            return Ok(EmbeddingResponse {
                vectors: Vec::new(),
                usage: TokenUsage::default(),
                model: request.model.clone(),
            });
        }

        let body = EmbeddingsRequest {
            model: &request.model,
            input: &request.inputs,
        };
        let mut response: EmbeddingsResponse = self.post("/embeddings", &body).await?;

        if response.data.len() != request.inputs.len() {
            return Err(ProviderError::Parse(format!(
                "expected {} embeddings, got {}",
                request.inputs.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);

        Ok(EmbeddingResponse {
            vectors: response.data.into_iter().map(|d| d.embedding).collect(),
            usage: response.usage.into(),
            model: response.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}
