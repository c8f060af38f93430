//! Scripted provider and fixtures shared by the runtime tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

use crate::providers::{
    EmbeddingRequest, EmbeddingResponse, JsonCompletion, JsonCompletionRequest, ModelProvider,
    ProviderError, TokenUsage,
};

type Embedder = Box<dyn Fn(&str) -> Vec<f32> + Send + Sync>;

/// Replays queued completion replies in order and embeds with a closure.
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    completion_times: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<JsonCompletionRequest>>,
    embed_calls: AtomicUsize,
    embedder: Embedder,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::with_embedder(|text| vec![text.len() as f32, 1.0])
    }

    pub(crate) fn with_embedder(embedder: impl Fn(&str) -> Vec<f32> + Send + Sync + 'static) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            completion_times: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            embed_calls: AtomicUsize::new(0),
            embedder: Box::new(embedder),
        }
    }

    pub(crate) fn push_reply(&self, reply: serde_json::Value) {
        self.replies.lock().push_back(Ok(reply.to_string()));
    }

    pub(crate) fn push_status(&self, status: u16) {
        self.replies
            .lock()
            .push_back(Err(ProviderError::from_status(status, "scripted failure")));
    }

    pub(crate) fn completion_calls(&self) -> usize {
        self.completion_times.lock().len()
    }

    pub(crate) fn completion_times(&self) -> Vec<Instant> {
        self.completion_times.lock().clone()
    }

    pub(crate) fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.completion_calls() + self.embed_calls()
    }

    /// User message of every completion request so far.
    pub(crate) fn user_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.messages.iter().find(|m| m.role == "user"))
            .map(|m| m.content.clone())
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete_json(
        &self,
        request: &JsonCompletionRequest,
    ) -> Result<JsonCompletion, ProviderError> {
        self.completion_times.lock().push(Instant::now());
        self.requests.lock().push(request.clone());

        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(content)) => Ok(JsonCompletion {
                content,
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                },
                model: request.model.clone(),
            }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::Http("no scripted reply left".to_string())),
        }
    }

    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResponse {
            vectors: request.inputs.iter().map(|t| (self.embedder)(t)).collect(),
            usage: TokenUsage {
                prompt_tokens: 10 * request.inputs.len() as u32,
                completion_tokens: 0,
            },
            model: request.model.clone(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A generator reply that passes every local gate for an unrelated paragraph.
pub(crate) fn candidate_json(question: &str) -> serde_json::Value {
    json!({
        "question": question,
        "choices": [
            {"label": "A", "text": "The controller"},
            {"label": "B", "text": "The processor"},
            {"label": "C", "text": "The data subject"},
            {"label": "D", "text": "The supervisory authority"}
        ],
        "correct_label": "A",
        "rationale": "The duty rests with the controller.",
        "difficulty": 3,
        "tags": ["controller_obligations"],
        "needs_human_review": false
    })
}

pub(crate) fn verification_json(ok: bool, confidence: f64) -> serde_json::Value {
    let issues: Vec<&str> = if ok { vec![] } else { vec!["answer B is also defensible"] };
    json!({
        "ok": ok,
        "issues": issues,
        "needs_human_review": false,
        "confidence": confidence
    })
}
