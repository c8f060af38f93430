use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

use quizforge_core::hashing::seed_to_u64;
use quizforge_core::{Language, StyleCorpus};

use crate::cache::NoStore;
use crate::config::PipelineConfig;
use crate::orchestrator::Orchestrator;
use crate::prompts::GenerationHints;
use crate::providers::ModelProvider;
use crate::resilience::{LlmUsage, UsageMeter};

use super::artifact::{BatchArtifact, BatchItem};
use super::config::BatchConfig;
use super::disk_cache::{DiskCache, SlotKey};
use super::source::{
    knowledge_digest, load_knowledge, load_style_corpus, paragraphs_for_topic, KnowledgeEntry,
};
use super::BatchError;

/// A slot that produced no item.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFailure {
    pub id: String,
    pub reason: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output: PathBuf,
    pub generated: usize,
    pub cache_hits: usize,
    pub failures: Vec<SlotFailure>,
    pub usage: LlmUsage,
}

/// One position in the batch.
#[derive(Debug, Clone)]
struct Slot {
    id: String,
    topic: String,
    seed: String,
}

impl Slot {
    fn new(index: usize, width: usize, topics: &[String], seed_prefix: &str) -> Self {
        let topic = topics[index % topics.len()].clone();
        Self {
            id: format!("{:0width$}-{}", index, topic, width = width),
            seed: format!("{}-{:0width$}", seed_prefix, index, width = width),
            topic,
        }
    }
}

/// Zero-padding for slot indices so ids sort in slot order.
fn index_width(target_count: usize) -> usize {
    target_count.saturating_sub(1).to_string().len().max(4)
}

/// Inputs shared by every slot of one run.
struct RunInputs<'a> {
    paragraphs: &'a [KnowledgeEntry],
    corpus: &'a StyleCorpus,
    knowledge: &'a str,
    meter: &'a UsageMeter,
}

enum SlotOutcome {
    Cached(BatchItem),
    Generated(BatchItem),
    Failed(SlotFailure),
}

/// Generates a fixed-size question set offline.
///
/// Each slot is filled by the same pipeline the endpoint uses, with a
/// persistent cache in front so reruns only pay for missing slots.
pub struct BatchGenerator {
    orchestrator: Orchestrator,
    config: BatchConfig,
    cache: DiskCache,
}

impl BatchGenerator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        pipeline: PipelineConfig,
        config: BatchConfig,
    ) -> Result<Self, BatchError> {
        config.validate()?;

        let pipeline = PipelineConfig {
            similarity: config.similarity.clone(),
            single_flight: false,
            ..pipeline
        };
        let orchestrator = Orchestrator::builder(provider)
            .store(Arc::new(NoStore))
            .config(pipeline)
            .build();
        let cache = DiskCache::open(&config.cache_dir)?;

        Ok(Self {
            orchestrator,
            config,
            cache,
        })
    }

    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        let paragraphs = load_knowledge(&self.config.knowledge_source)?;
        let meter = UsageMeter::new();
        let corpus = self.load_corpus(&meter).await?;

        let knowledge = knowledge_digest(&paragraphs);

        let topics = self.config.topic_list();
        let width = index_width(self.config.target_count);
        let slots: Vec<Slot> = (0..self.config.target_count)
            .map(|index| Slot::new(index, width, &topics, &self.config.seed_prefix))
            .collect();

        tracing::info!(
            slots = slots.len(),
            paragraphs = paragraphs.len(),
            corpus = corpus.len(),
            concurrency = self.config.concurrency,
            "Starting batch"
        );

        let inputs = RunInputs {
            paragraphs: &paragraphs,
            corpus: &corpus,
            knowledge: &knowledge,
            meter: &meter,
        };
        let outcomes: Vec<SlotOutcome> = stream::iter(slots)
            .map(|slot| self.fill_slot(slot, &inputs))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        let mut cache_hits = 0;
        for outcome in outcomes {
            match outcome {
                SlotOutcome::Cached(item) => {
                    cache_hits += 1;
                    items.push(item);
                }
                SlotOutcome::Generated(item) => items.push(item),
                SlotOutcome::Failed(failure) => failures.push(failure),
            }
        }
        failures.sort_by(|a, b| a.id.cmp(&b.id));

        let artifact = BatchArtifact::new(items);
        artifact.write_to(&self.config.output)?;

        let report = BatchReport {
            output: self.config.output.clone(),
            generated: artifact.items.len(),
            cache_hits,
            failures,
            usage: meter.snapshot(),
        };
        tracing::info!(
            generated = report.generated,
            cache_hits = report.cache_hits,
            failed = report.failures.len(),
            tokens = report.usage.total_tokens,
            cost = report.usage.estimated_cost,
            output = %report.output.display(),
            "Batch finished"
        );
        Ok(report)
    }

    /// Load the style corpus and embed it once for every slot.
    async fn load_corpus(&self, meter: &UsageMeter) -> Result<StyleCorpus, BatchError> {
        let Some(path) = &self.config.style_corpus else {
            return Ok(StyleCorpus::default());
        };
        let corpus = load_style_corpus(path, self.config.similarity.corpus_limit)?;
        if corpus.is_empty() {
            return Ok(corpus);
        }

        let mut usage = LlmUsage::default();
        let vectors = self
            .orchestrator
            .gateway()
            .embed(corpus.texts().to_vec(), &mut usage)
            .await
            .map_err(BatchError::Embedding)?;
        meter.record(&usage);
        Ok(corpus.with_embeddings(vectors))
    }

    async fn fill_slot(&self, slot: Slot, inputs: &RunInputs<'_>) -> SlotOutcome {
        let models = self.orchestrator.gateway().models();
        let difficulty = self.config.difficulty;
        let slot_key = SlotKey {
            seed: &slot.seed,
            topic: &slot.topic,
            difficulty: difficulty.as_str(),
            language: self.config.language.as_ref().map(Language::code).unwrap_or("auto"),
            knowledge: inputs.knowledge,
        };
        let key = DiskCache::key(&slot_key, &models.generator, &models.verifier);

        if let Some(item) = self.cache.get(&key) {
            tracing::debug!(id = %slot.id, "Slot served from disk cache");
            return SlotOutcome::Cached(item);
        }

        let pool = paragraphs_for_topic(inputs.paragraphs, &slot.topic);
        let base = seed_to_u64(&slot.seed);
        let mut last_reason = String::from("no attempt made");

        for attempt in 0..self.config.max_attempts_per_item {
            let pick = (base.wrapping_add(u64::from(attempt)) % pool.len() as u64) as usize;
            let paragraph = pool[pick].to_paragraph(self.config.language, inputs.corpus.clone());
            let hints = GenerationHints {
                focus_topic: Some(slot.topic.clone()),
                target_difficulty: Some(difficulty.target()),
                seed: Some(format!("{}#{}", slot.seed, attempt)),
            };

            let outcome = self
                .orchestrator
                .run_metered(&paragraph, &hints, inputs.meter)
                .await;
            let run = match outcome {
                Ok(run) => run,
                Err(e) => {
                    tracing::warn!(id = %slot.id, attempt, error = %e, "Slot attempt failed");
                    last_reason = e.to_string();
                    continue;
                }
            };

            let confidence = run.result.verification.confidence;
            if confidence < self.config.min_confidence {
                tracing::debug!(id = %slot.id, attempt, confidence, "Below confidence threshold");
                last_reason = format!(
                    "verifier confidence {:.2} below {:.2}",
                    confidence, self.config.min_confidence
                );
                continue;
            }

            let Some(item) = BatchItem::from_result(
                slot.id.clone(),
                slot.topic.clone(),
                difficulty,
                slot.seed.clone(),
                &run.result,
            ) else {
                last_reason = "correct label missing from choices".to_string();
                continue;
            };

            if let Err(e) = self.cache.put(&key, &item) {
                tracing::warn!(id = %slot.id, error = %e, "Failed to write disk cache entry");
            }
            return SlotOutcome::Generated(item);
        }

        SlotOutcome::Failed(SlotFailure {
            id: slot.id,
            reason: last_reason,
        })
    }
}
