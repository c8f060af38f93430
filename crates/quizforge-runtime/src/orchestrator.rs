//! The generate → validate → verify → deduplicate loop.
//!
//! One run turns a [`SourceParagraph`] into an accepted [`QuestionResult`]
//! or an error. Each attempt moves through
//! `Generating → LocallyValidating → Verifying → AssessingSimilarity` and
//! ends in one of:
//! - accepted: cached and returned
//! - a recoverable failure (gate, verifier, similarity revise): next attempt
//! - a terminal failure (similarity reject, provider error): returned at once
//!
//! The whole run, retries included, is bounded by one deadline.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use quizforge_core::similarity::skipped_assessment;
use quizforge_core::{
    assess_similarity, resolve_language, run_local_gates, tag_topics, CacheKey, Candidate,
    Language, QuestionResult, SimilarityAction, SourceParagraph, ValidationError,
};

use crate::cache::{ResultCache, ResultStore, SingleFlight};
use crate::config::PipelineConfig;
use crate::gateway::{GatewayError, ModelGateway};
use crate::prompts::{generation_messages, verification_messages, GenerationContext, GenerationHints};
use crate::providers::{ModelProvider, ProviderError};
use crate::resilience::{LlmUsage, UsageMeter};

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Generating,
    LocallyValidating,
    Verifying,
    AssessingSimilarity,
    Accepted,
    Rejected,
    Failed,
}

/// Why an attempt was discarded without ending the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Verifier rejected the candidate: {}", .issues.join("; "))]
    VerificationFailed { issues: Vec<String> },

    #[error("Similarity gate asked for a revision ({reason}, max cosine {max_cosine:?})")]
    SimilarityRevise {
        reason: String,
        max_cosine: Option<f32>,
    },
}

impl AttemptFailure {
    /// Text sent back to the generator on the next attempt.
    pub fn feedback(&self) -> String {
        match self {
            AttemptFailure::Validation(ValidationError::Overlap { .. }) => {
                "The question reused too much wording from the paragraph. Rephrase it in your own words.".to_string()
            }
            AttemptFailure::Validation(ValidationError::DifficultyFloor { .. }) => {
                "The question was too easy. Ask about applying the rule, an exception, or a short scenario.".to_string()
            }
            AttemptFailure::Validation(e) => format!("The reply was invalid: {}", e),
            AttemptFailure::VerificationFailed { issues } => {
                format!("A reviewer found these problems: {}", issues.join("; "))
            }
            AttemptFailure::SimilarityRevise { reason, .. } => match reason.as_str() {
                quizforge_core::similarity::REASON_TOO_FAR => {
                    "The question did not match the style of the existing questions.".to_string()
                }
                _ => "The question was too close to, or too far from, the existing questions. Vary the angle.".to_string(),
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AttemptFailure::Validation(e) => e.code(),
            AttemptFailure::VerificationFailed { .. } => "verification_failed",
            AttemptFailure::SimilarityRevise { .. } => "similarity_revise",
        }
    }
}

/// Errors that end a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error during {stage}: {source}")]
    Provider {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Candidate duplicates an existing question ({reason}, max cosine {max_cosine:?})")]
    SimilarityReject {
        reason: String,
        max_cosine: Option<f32>,
    },

    #[error("No acceptable question after {attempts} attempts; last failure: {last}")]
    Exhausted { attempts: u32, last: AttemptFailure },

    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub result: QuestionResult,
    /// True when served from the cache without any model call
    pub cache_hit: bool,
    /// Attempts used; 0 for a cache hit
    pub attempts: u32,
    pub usage: LlmUsage,
}

enum AttemptError {
    Retry(AttemptFailure),
    Fatal(PipelineError),
}

impl From<AttemptFailure> for AttemptError {
    fn from(failure: AttemptFailure) -> Self {
        AttemptError::Retry(failure)
    }
}

fn gateway_error(stage: &'static str, error: GatewayError) -> AttemptError {
    match error {
        GatewayError::Provider(source) => AttemptError::Fatal(PipelineError::Provider { stage, source }),
        GatewayError::Validation(e) => AttemptError::Retry(AttemptFailure::Validation(e)),
    }
}

/// Per-run values shared by every attempt.
struct RunContext<'a> {
    paragraph: &'a SourceParagraph,
    language: Language,
    topics: Vec<String>,
    hints: &'a GenerationHints,
}

/// Runs the question pipeline.
pub struct Orchestrator {
    gateway: ModelGateway,
    store: Arc<dyn ResultStore>,
    single_flight: Option<SingleFlight>,
    config: PipelineConfig,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    provider: Arc<dyn ModelProvider>,
    store: Option<Arc<dyn ResultStore>>,
    config: PipelineConfig,
}

impl OrchestratorBuilder {
    pub fn store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Orchestrator {
        let gateway = ModelGateway::new(
            self.provider,
            self.config.models.clone(),
            self.config.retry,
        );
        let single_flight = self.config.single_flight.then(SingleFlight::new);
        Orchestrator {
            gateway,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(ResultCache::new())),
            single_flight,
            config: self.config,
        }
    }
}

impl Orchestrator {
    pub fn builder(provider: Arc<dyn ModelProvider>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            provider,
            store: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Produce an accepted question for `paragraph`.
    pub async fn run(&self, paragraph: &SourceParagraph) -> Result<PipelineRun, PipelineError> {
        self.run_with_hints(paragraph, &GenerationHints::default()).await
    }

    /// Like [`run`](Self::run), with extra steering for the generator.
    pub async fn run_with_hints(
        &self,
        paragraph: &SourceParagraph,
        hints: &GenerationHints,
    ) -> Result<PipelineRun, PipelineError> {
        let mut usage = LlmUsage::default();
        self.execute(paragraph, hints, &mut usage).await
    }

    /// Like [`run_with_hints`](Self::run_with_hints), recording usage into
    /// `meter` whether the run succeeds, fails or times out.
    pub async fn run_metered(
        &self,
        paragraph: &SourceParagraph,
        hints: &GenerationHints,
        meter: &UsageMeter,
    ) -> Result<PipelineRun, PipelineError> {
        let mut usage = LlmUsage::default();
        let outcome = self.execute(paragraph, hints, &mut usage).await;
        meter.record(&usage);
        outcome
    }

    async fn execute(
        &self,
        paragraph: &SourceParagraph,
        hints: &GenerationHints,
        usage: &mut LlmUsage,
    ) -> Result<PipelineRun, PipelineError> {
        if paragraph.text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("paragraph is empty".to_string()));
        }

        let language = resolve_language(
            paragraph.declared_language,
            &paragraph.text,
            self.config.default_language,
        );
        let topics = tag_topics(&paragraph.text);
        let key = CacheKey::for_paragraph(
            &paragraph.text,
            language,
            paragraph.article_ref.as_deref(),
            &topics,
        );

        if let Some(result) = self.store.get(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(cached(result));
        }

        let _flight = match &self.single_flight {
            Some(flight) => {
                let guard = flight.acquire(&key).await;
                if let Some(result) = self.store.get(&key).await {
                    tracing::debug!(key = %key, "Cache hit after waiting for in-flight run");
                    return Ok(cached(result));
                }
                Some(guard)
            }
            None => None,
        };

        let ctx = RunContext {
            paragraph,
            language,
            topics,
            hints,
        };

        // Calls finished before a timeout stay counted in `usage`
        let deadline = self.config.deadline;
        let bounded = tokio::time::timeout(deadline, self.attempt_loop(&ctx, usage)).await;
        let (result, attempts) = match bounded {
            Ok(outcome) => outcome?,
            Err(_) => {
                tracing::warn!(
                    state = ?PipelineState::Failed,
                    deadline = ?deadline,
                    llm_calls = usage.llm_calls,
                    "Pipeline deadline exceeded"
                );
                return Err(PipelineError::DeadlineExceeded(deadline));
            }
        };

        self.store.set(key, result.clone()).await;
        Ok(PipelineRun {
            result,
            cache_hit: false,
            attempts,
            usage: usage.clone(),
        })
    }

    async fn attempt_loop(
        &self,
        ctx: &RunContext<'_>,
        usage: &mut LlmUsage,
    ) -> Result<(QuestionResult, u32), PipelineError> {
        let mut corpus_vectors: Option<Arc<Vec<Vec<f32>>>> = None;
        let mut last_failure: Option<AttemptFailure> = None;
        let attempts = self.config.semantic_attempts;

        for attempt in 1..=attempts {
            let feedback = last_failure.as_ref().map(AttemptFailure::feedback);
            let outcome = self
                .attempt(ctx, attempt, feedback.as_deref(), &mut corpus_vectors, usage)
                .await;

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        state = ?PipelineState::Accepted,
                        attempt,
                        tokens = usage.total_tokens,
                        "Question accepted"
                    );
                    return Ok((result, attempt));
                }
                Err(AttemptError::Retry(failure)) => {
                    tracing::warn!(attempt, reason = failure.code(), error = %failure, "Attempt discarded");
                    last_failure = Some(failure);
                }
                Err(AttemptError::Fatal(error)) => {
                    let state = match error {
                        PipelineError::SimilarityReject { .. } => PipelineState::Rejected,
                        _ => PipelineState::Failed,
                    };
                    tracing::warn!(state = ?state, attempt, error = %error, "Pipeline stopped");
                    return Err(error);
                }
            }
        }

        match last_failure {
            Some(last) => {
                tracing::warn!(state = ?PipelineState::Failed, attempts, "Attempt budget exhausted");
                Err(PipelineError::Exhausted { attempts, last })
            }
            None => Err(PipelineError::InvalidInput(
                "semantic_attempts must be at least 1".to_string(),
            )),
        }
    }

    async fn attempt(
        &self,
        ctx: &RunContext<'_>,
        attempt: u32,
        feedback: Option<&str>,
        corpus_vectors: &mut Option<Arc<Vec<Vec<f32>>>>,
        usage: &mut LlmUsage,
    ) -> Result<QuestionResult, AttemptError> {
        let paragraph = ctx.paragraph;
        let corpus = &paragraph.existing_question_corpus;

        tracing::debug!(state = ?PipelineState::Generating, attempt, "Requesting candidate");
        let messages = generation_messages(&GenerationContext {
            paragraph: &paragraph.text,
            language: ctx.language,
            article_ref: paragraph.article_ref.as_deref(),
            topics: &ctx.topics,
            style_examples: corpus.texts(),
            hints: ctx.hints,
            feedback,
        });
        let candidate = self
            .gateway
            .generate(messages, usage)
            .await
            .map_err(|e| gateway_error("generate", e))?;

        tracing::debug!(state = ?PipelineState::LocallyValidating, attempt, "Running local gates");
        let report = run_local_gates(&candidate, &paragraph.text, &self.config.gates)
            .map_err(AttemptFailure::from)?;

        tracing::debug!(state = ?PipelineState::Verifying, attempt, "Requesting verification");
        let verification = self
            .gateway
            .verify(
                verification_messages(&paragraph.text, &candidate, ctx.language),
                usage,
            )
            .await
            .map_err(|e| gateway_error("verify", e))?;
        if !verification.ok {
            return Err(AttemptFailure::VerificationFailed {
                issues: verification.issues,
            }
            .into());
        }

        tracing::debug!(state = ?PipelineState::AssessingSimilarity, attempt, "Comparing with corpus");
        let similarity = if corpus.is_empty() {
            skipped_assessment()
        } else {
            let vectors = self.corpus_vectors(corpus_vectors, ctx, usage).await?;
            let embedded = self
                .gateway
                .embed(vec![candidate.question_text.clone()], usage)
                .await
                .map_err(|source| AttemptError::Fatal(PipelineError::Provider { stage: "embed", source }))?;
            let candidate_vector = embedded.into_iter().next().unwrap_or_default();
            assess_similarity(&candidate_vector, corpus.texts(), &vectors, &self.config.similarity)
        };

        match similarity.action {
            SimilarityAction::Reject => {
                return Err(AttemptError::Fatal(PipelineError::SimilarityReject {
                    reason: similarity.reason,
                    max_cosine: similarity.max_cosine_to_any_existing,
                }))
            }
            SimilarityAction::Revise => {
                return Err(AttemptFailure::SimilarityRevise {
                    reason: similarity.reason,
                    max_cosine: similarity.max_cosine_to_any_existing,
                }
                .into())
            }
            SimilarityAction::Accept => {}
        }

        let candidate = finalize_candidate(candidate, &ctx.topics, verification.needs_human_review);
        Ok(QuestionResult {
            language: ctx.language,
            article_ref: paragraph.article_ref.clone(),
            candidate,
            heuristic_difficulty: report.heuristic_difficulty,
            verification,
            overlap_score: report.overlap_score,
            similarity,
        })
    }

    /// Corpus embeddings: precomputed if supplied, else embedded once per run.
    async fn corpus_vectors(
        &self,
        slot: &mut Option<Arc<Vec<Vec<f32>>>>,
        ctx: &RunContext<'_>,
        usage: &mut LlmUsage,
    ) -> Result<Arc<Vec<Vec<f32>>>, AttemptError> {
        if let Some(vectors) = slot {
            return Ok(vectors.clone());
        }

        let corpus = &ctx.paragraph.existing_question_corpus;
        let vectors = match corpus.embeddings() {
            Some(precomputed) => Arc::new(precomputed.to_vec()),
            None => {
                let embedded = self
                    .gateway
                    .embed(corpus.texts().to_vec(), usage)
                    .await
                    .map_err(|source| {
                        AttemptError::Fatal(PipelineError::Provider {
                            stage: "embed_corpus",
                            source,
                        })
                    })?;
                Arc::new(embedded)
            }
        };
        *slot = Some(vectors.clone());
        Ok(vectors)
    }
}

fn cached(result: QuestionResult) -> PipelineRun {
    PipelineRun {
        result,
        cache_hit: true,
        attempts: 0,
        usage: LlmUsage::default(),
    }
}

/// Merge paragraph topics into the tags and carry the review flag.
fn finalize_candidate(mut candidate: Candidate, topics: &[String], review: bool) -> Candidate {
    for topic in topics {
        if !candidate.tags.contains(topic) {
            candidate.tags.push(topic.clone());
        }
    }
    candidate.needs_human_review |= review;
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candidate_json, verification_json, ScriptedProvider};
    use quizforge_core::StyleCorpus;
    use serde_json::json;

    const PARAGRAPH: &str = "Each supervisory authority may impose administrative fines \
        that are effective, proportionate and dissuasive in each individual case.";

    fn orchestrator(provider: Arc<ScriptedProvider>) -> Orchestrator {
        Orchestrator::builder(provider).build()
    }

    fn paragraph() -> SourceParagraph {
        SourceParagraph::new(PARAGRAPH).with_article_ref("Art. 83")
    }

    #[tokio::test]
    async fn test_happy_path_without_corpus() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));

        let run = orchestrator(provider.clone()).run(&paragraph()).await.unwrap();

        assert!(!run.cache_hit);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.result.language, Language::En);
        assert_eq!(run.result.article_ref.as_deref(), Some("Art. 83"));
        assert_eq!(run.result.similarity.reason, "skipped_no_corpus");
        assert!(run.result.candidate.tags.contains(&"penalties".to_string()));
        assert_eq!(run.usage.llm_calls, 2);
        assert_eq!(provider.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_second_identical_run_is_cached() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));
        let orchestrator = orchestrator(provider.clone());

        let first = orchestrator.run(&paragraph()).await.unwrap();
        let calls_after_first = provider.total_calls();
        let second = orchestrator.run(&paragraph()).await.unwrap();

        assert!(second.cache_hit);
        assert_eq!(second.attempts, 0);
        assert_eq!(provider.total_calls(), calls_after_first);
        assert_eq!(first.result, second.result);
    }

    #[tokio::test]
    async fn test_verifier_rejection_retries_with_feedback() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(false, 0.8));
        provider.push_reply(candidate_json("Which party must keep records of processing?"));
        provider.push_reply(verification_json(true, 0.9));

        let run = orchestrator(provider.clone()).run(&paragraph()).await.unwrap();

        assert_eq!(run.attempts, 2);
        assert_eq!(run.result.candidate.question_text, "Which party must keep records of processing?");
        let prompts = provider.user_prompts();
        // generate, verify, generate, verify
        assert_eq!(prompts.len(), 4);
        assert!(prompts[2].contains("answer B is also defensible"));
        assert!(!prompts[0].contains("previous attempt"));
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_failure() {
        let provider = Arc::new(ScriptedProvider::new());
        // duplicate choice texts every time
        let mut bad = candidate_json("Who is responsible for demonstrating compliance?");
        bad["choices"][1]["text"] = json!("The controller!");
        for _ in 0..3 {
            provider.push_reply(bad.clone());
        }

        let err = orchestrator(provider.clone()).run(&paragraph()).await.unwrap_err();

        match err {
            PipelineError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.code(), "choice_integrity");
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(provider.completion_calls(), 3);
    }

    #[tokio::test]
    async fn test_similarity_reject_is_terminal() {
        // every text embeds to the same vector: cosine 1.0
        let provider = Arc::new(ScriptedProvider::with_embedder(|_| vec![1.0, 0.0]));
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));
        provider.push_reply(candidate_json("Never used?"));

        let corpus = StyleCorpus::sampled(vec!["Who must demonstrate compliance?".to_string()], 400);
        let err = orchestrator(provider.clone())
            .run(&paragraph().with_corpus(corpus))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SimilarityReject { .. }));
        assert_eq!(provider.completion_calls(), 2);
    }

    #[tokio::test]
    async fn test_similarity_window_accepts_and_reuses_corpus_vectors() {
        let provider = Arc::new(ScriptedProvider::with_embedder(|text| {
            if text.starts_with("Existing") {
                vec![1.0, 0.0]
            } else if text.contains("far") {
                vec![0.0, 1.0]
            } else {
                // cosine 0.8 with the corpus vector
                vec![0.8, 0.6]
            }
        }));
        provider.push_reply(candidate_json("A far away question about fines?"));
        provider.push_reply(verification_json(true, 0.9));
        provider.push_reply(candidate_json("Who may impose the administrative fines?"));
        provider.push_reply(verification_json(true, 0.9));

        let corpus = StyleCorpus::sampled(vec!["Existing question about fines?".to_string()], 400);
        let run = orchestrator(provider.clone())
            .run(&paragraph().with_corpus(corpus))
            .await
            .unwrap();

        assert_eq!(run.attempts, 2);
        assert_eq!(run.result.similarity.action, SimilarityAction::Accept);
        let max = run.result.similarity.max_cosine_to_any_existing.unwrap();
        assert!((max - 0.8).abs() < 1e-5);
        // corpus once, then one candidate per attempt
        assert_eq!(provider.embed_calls(), 3);
    }

    #[tokio::test]
    async fn test_precomputed_corpus_embeddings_skip_corpus_call() {
        let provider = Arc::new(ScriptedProvider::with_embedder(|_| vec![0.8, 0.6]));
        provider.push_reply(candidate_json("Who may impose the administrative fines?"));
        provider.push_reply(verification_json(true, 0.9));

        let corpus = StyleCorpus::sampled(vec!["Existing?".to_string()], 400)
            .with_embeddings(vec![vec![1.0, 0.0]]);
        let run = orchestrator(provider.clone())
            .run(&paragraph().with_corpus(corpus))
            .await
            .unwrap();

        assert_eq!(run.result.similarity.action, SimilarityAction::Accept);
        assert_eq!(provider.embed_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_after_retries_fails_run() {
        let provider = Arc::new(ScriptedProvider::new());
        for _ in 0..4 {
            provider.push_status(503);
        }

        let err = orchestrator(provider.clone()).run(&paragraph()).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Provider { stage: "generate", source: ProviderError::Status { status: 503, .. } }
        ));
        assert_eq!(provider.completion_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_generation_backs_off_then_verifies() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_status(429);
        provider.push_status(429);
        provider.push_reply(candidate_json("Who may impose the administrative fines?"));
        provider.push_reply(verification_json(true, 0.9));

        let run = orchestrator(provider.clone()).run(&paragraph()).await.unwrap();

        assert_eq!(run.attempts, 1);
        // three generate calls, then one verify
        assert_eq!(provider.completion_calls(), 4);
        assert_eq!(run.usage.llm_calls, 2);

        let times = provider.completion_times();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(500));
        assert!(second_gap >= Duration::from_millis(1000));
        assert!(second_gap > first_gap);
        let prompts = provider.user_prompts();
        assert_eq!(prompts[0], prompts[2]);
    }

    #[tokio::test]
    async fn test_metered_run_records_usage_of_a_failed_run() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut bad = candidate_json("Who is responsible for demonstrating compliance?");
        bad["choices"][1]["text"] = json!("The controller!");
        for _ in 0..3 {
            provider.push_reply(bad.clone());
        }
        let meter = UsageMeter::new();

        let err = orchestrator(provider.clone())
            .run_metered(&paragraph(), &GenerationHints::default(), &meter)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Exhausted { attempts: 3, .. }));
        let usage = meter.snapshot();
        assert_eq!(usage.llm_calls as usize, provider.completion_calls());
        assert_eq!(usage.total_tokens, 3 * 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metered_run_keeps_usage_spent_before_the_deadline() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who may impose the administrative fines?"));
        for _ in 0..4 {
            provider.push_status(503);
        }
        let config = PipelineConfig {
            deadline: Duration::from_secs(1),
            ..Default::default()
        };
        let meter = UsageMeter::new();

        let err = Orchestrator::builder(provider)
            .config(config)
            .build()
            .run_metered(&paragraph(), &GenerationHints::default(), &meter)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::DeadlineExceeded(Duration::from_secs(1)));
        assert_eq!(meter.snapshot().llm_calls, 1);
    }

    #[tokio::test]
    async fn test_empty_paragraph_rejected() {
        let provider = Arc::new(ScriptedProvider::new());
        let err = orchestrator(provider.clone())
            .run(&SourceParagraph::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_run() {
        let provider = Arc::new(ScriptedProvider::new());
        for _ in 0..4 {
            provider.push_status(429);
        }
        let config = PipelineConfig {
            deadline: Duration::from_secs(1),
            ..Default::default()
        };

        let err = Orchestrator::builder(provider)
            .config(config)
            .build()
            .run(&paragraph())
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::DeadlineExceeded(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_for_same_paragraph_share_one_pipeline() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_reply(candidate_json("Who is responsible for demonstrating compliance?"));
        provider.push_reply(verification_json(true, 0.9));
        let orchestrator = Arc::new(orchestrator(provider.clone()));

        let a = {
            let o = orchestrator.clone();
            tokio::spawn(async move { o.run(&paragraph()).await })
        };
        let b = {
            let o = orchestrator.clone();
            tokio::spawn(async move { o.run(&paragraph()).await })
        };
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert_eq!(provider.completion_calls(), 2);
        assert!(a.cache_hit ^ b.cache_hit);
        assert_eq!(a.result, b.result);
    }
}
