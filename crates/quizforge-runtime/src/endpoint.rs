//! HTTP-shaped front end for the pipeline.
//!
//! [`GenerationService::handle`] maps a method and a raw body to a status
//! code and a JSON body. It knows nothing about any web framework; the
//! CLI's `serve` command mounts it on a router.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use quizforge_core::{ExistingQuestion, Language, SourceParagraph, StyleCorpus};

use crate::orchestrator::Orchestrator;

/// Body of `POST /generate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub paragraph: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub article_ref: Option<String>,
    /// `null` counts as absent
    #[serde(default)]
    pub existing_questions: Option<Vec<ExistingQuestion>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: Value,
}

impl EndpointResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": code, "message": message.into() }),
        }
    }
}

/// Request handler for question generation.
pub struct GenerationService {
    /// Absent when no API key was configured
    orchestrator: Option<Arc<Orchestrator>>,
    corpus_limit: usize,
}

impl GenerationService {
    pub fn new(orchestrator: Option<Arc<Orchestrator>>, corpus_limit: usize) -> Self {
        Self {
            orchestrator,
            corpus_limit,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.orchestrator.is_some()
    }

    /// Body for the health route: whether a provider is configured, which
    /// one, and whether it reports itself usable.
    pub async fn health(&self) -> Value {
        match &self.orchestrator {
            Some(orchestrator) => {
                let gateway = orchestrator.gateway();
                let healthy = gateway.health_check().await;
                json!({
                    "status": if healthy { "ok" } else { "degraded" },
                    "configured": true,
                    "provider": gateway.provider_name(),
                    "provider_healthy": healthy,
                })
            }
            None => json!({
                "status": "ok",
                "configured": false,
                "provider": Value::Null,
                "provider_healthy": false,
            }),
        }
    }

    pub async fn handle(&self, method: &str, body: &[u8]) -> EndpointResponse {
        if !method.eq_ignore_ascii_case("POST") {
            return EndpointResponse::error(405, "method_not_allowed", "Use POST");
        }

        let request: GenerateRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                return EndpointResponse::error(400, "invalid_request", format!("Invalid JSON body: {}", e))
            }
        };

        let language = match request.language.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<Language>() {
                Ok(language) => Some(language),
                Err(e) => return EndpointResponse::error(400, "invalid_request", e),
            },
        };

        let text = match request.paragraph.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return EndpointResponse::error(400, "paragraph_required", "paragraph is required"),
        };

        let Some(orchestrator) = &self.orchestrator else {
            return EndpointResponse::error(500, "missing_api_key", "OPENAI_API_KEY is not set");
        };

        let existing: Vec<String> = request
            .existing_questions
            .iter()
            .flatten()
            .filter_map(ExistingQuestion::text)
            .map(|t| t.trim().to_string())
            .collect();

        let mut paragraph = SourceParagraph::new(text)
            .with_corpus(StyleCorpus::sampled(existing, self.corpus_limit));
        paragraph.declared_language = language;
        paragraph.article_ref = request.article_ref.filter(|a| !a.trim().is_empty());

        match orchestrator.run(&paragraph).await {
            Ok(run) => {
                tracing::info!(
                    cache_hit = run.cache_hit,
                    attempts = run.attempts,
                    tokens = run.usage.total_tokens,
                    "Generated question"
                );
                match serde_json::to_value(&run.result) {
                    Ok(body) => EndpointResponse::ok(body),
                    Err(e) => EndpointResponse::error(500, "internal_error", e.to_string()),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed");
                EndpointResponse::error(422, "generation_failed", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate_json, verification_json, ScriptedProvider};

    fn service(provider: Option<Arc<ScriptedProvider>>) -> GenerationService {
        let orchestrator =
            provider.map(|p| Arc::new(Orchestrator::builder(p).build()));
        GenerationService::new(orchestrator, 400)
    }

    fn body(value: Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    #[tokio::test]
    async fn test_non_post_is_rejected() {
        let response = service(None).handle("GET", b"").await;
        assert_eq!(response.status, 405);
        assert_eq!(response.body["error"], "method_not_allowed");
    }

    #[tokio::test]
    async fn test_bad_json_and_language() {
        let response = service(None).handle("POST", b"{not json").await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "invalid_request");

        let response = service(None)
            .handle("POST", &body(json!({"paragraph": "Text", "language": "de"})))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_missing_paragraph_checked_before_api_key() {
        let response = service(None)
            .handle("POST", &body(json!({"paragraph": "   "})))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "paragraph_required");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let response = service(None)
            .handle("POST", &body(json!({"paragraph": "Consent must be freely given."})))
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "missing_api_key");
    }

    #[tokio::test]
    async fn test_success_returns_flat_result() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));

        let response = service(Some(provider))
            .handle(
                "post",
                &body(json!({
                    "paragraph": "Each supervisory authority may impose administrative fines.",
                    "language": "en",
                    "article_ref": "Art. 83",
                    "existing_questions": []
                })),
            )
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["language"], "en");
        assert_eq!(response.body["article_ref"], "Art. 83");
        assert_eq!(response.body["question"], "Who is responsible for demonstrating compliance?");
        assert_eq!(response.body["choices"].as_array().unwrap().len(), 4);
        assert_eq!(response.body["verification"]["ok"], true);
        assert_eq!(response.body["similarity"]["reason"], "skipped_no_corpus");
    }

    #[tokio::test]
    async fn test_null_existing_questions_is_treated_as_absent() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));

        let response = service(Some(provider.clone()))
            .handle(
                "POST",
                &body(json!({
                    "paragraph": "Each supervisory authority may impose administrative fines.",
                    "existing_questions": null
                })),
            )
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body["similarity"]["reason"], "skipped_no_corpus");
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_health_reports_provider() {
        let configured = service(Some(Arc::new(ScriptedProvider::new()))).health().await;
        assert_eq!(configured["status"], "ok");
        assert_eq!(configured["configured"], true);
        assert_eq!(configured["provider"], "scripted");
        assert_eq!(configured["provider_healthy"], true);

        let missing = service(None).health().await;
        assert_eq!(missing["configured"], false);
        assert!(missing["provider"].is_null());
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_422() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_status(401);

        let response = service(Some(provider))
            .handle("POST", &body(json!({"paragraph": "Consent must be freely given."})))
            .await;

        assert_eq!(response.status, 422);
        assert_eq!(response.body["error"], "generation_failed");
        assert!(response.body["message"].as_str().unwrap().contains("401"));
    }
}
