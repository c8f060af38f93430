//! `quizforge` command-line interface.

mod server;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use quizforge_core::{
    parse_candidate, run_local_gates, ExistingQuestion, Language, SourceParagraph, StyleCorpus,
};
use quizforge_runtime::{
    BatchConfig, BatchGenerator, GenerationService, OpenAiProvider, Orchestrator, PipelineConfig,
    ProviderError,
};

#[derive(Parser)]
#[command(name = "quizforge")]
#[command(author, version, about = "Generate vetted multiple-choice questions from source paragraphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline config (YAML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one question and print it as JSON
    Generate {
        /// Paragraph text
        #[arg(long, conflicts_with = "paragraph_file")]
        paragraph: Option<String>,

        /// Read the paragraph from a file
        #[arg(long)]
        paragraph_file: Option<PathBuf>,

        /// pl or en; detected when omitted
        #[arg(long)]
        language: Option<Language>,

        #[arg(long)]
        article_ref: Option<String>,

        /// JSON list of existing questions to compare against
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Serve POST /generate over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },

    /// Run an offline batch described by a YAML file
    Batch {
        /// Batch config (YAML)
        batch_config: PathBuf,
    },

    /// Run the local gates on a candidate without calling any model
    Check {
        /// Candidate JSON as the generator would return it
        candidate: PathBuf,

        /// Paragraph the candidate was generated from
        #[arg(long)]
        paragraph_file: PathBuf,
    },
}

#[derive(Serialize)]
struct CheckReport {
    ok: bool,
    overlap_score: Option<f64>,
    heuristic_difficulty: Option<u8>,
    error: Option<String>,
    code: Option<&'static str>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_pipeline_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_pipeline_config(cli.config.as_deref())?;
    tracing::debug!(
        generator = %config.models.generator,
        verifier = %config.models.verifier,
        embedding = %config.models.embedding,
        "Loaded pipeline config"
    );

    match cli.command {
        Commands::Generate {
            paragraph,
            paragraph_file,
            language,
            article_ref,
            existing,
        } => {
            cmd_generate(config, paragraph, paragraph_file, language, article_ref, existing).await
        }
        Commands::Serve { bind } => cmd_serve(config, bind).await,
        Commands::Batch { batch_config } => cmd_batch(config, &batch_config).await,
        Commands::Check {
            candidate,
            paragraph_file,
        } => cmd_check(&config, &candidate, &paragraph_file),
    }
}

async fn cmd_generate(
    config: PipelineConfig,
    paragraph: Option<String>,
    paragraph_file: Option<PathBuf>,
    language: Option<Language>,
    article_ref: Option<String>,
    existing: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text = match (paragraph, paragraph_file) {
        (Some(text), _) => text,
        (None, Some(path)) => read_text(&path)?,
        (None, None) => bail!("pass --paragraph or --paragraph-file"),
    };

    let corpus = match existing {
        Some(path) => {
            let raw: Vec<ExistingQuestion> = serde_json::from_str(&read_text(&path)?)
                .with_context(|| format!("parsing {}", path.display()))?;
            let texts = raw
                .iter()
                .filter_map(ExistingQuestion::text)
                .map(|t| t.trim().to_string())
                .collect();
            StyleCorpus::sampled(texts, config.similarity.corpus_limit)
        }
        None => StyleCorpus::default(),
    };

    let mut source = SourceParagraph::new(text).with_corpus(corpus);
    source.declared_language = language;
    source.article_ref = article_ref;

    let provider = OpenAiProvider::from_env(&config.models)?;
    let orchestrator = Orchestrator::builder(Arc::new(provider))
        .config(config)
        .build();

    let run = orchestrator.run(&source).await?;
    tracing::info!(
        attempts = run.attempts,
        tokens = run.usage.total_tokens,
        cost = run.usage.estimated_cost,
        "Question accepted"
    );
    println!("{}", serde_json::to_string_pretty(&run.result)?);
    Ok(())
}

async fn cmd_serve(config: PipelineConfig, bind: SocketAddr) -> anyhow::Result<()> {
    let corpus_limit = config.similarity.corpus_limit;
    let orchestrator = match OpenAiProvider::from_env(&config.models) {
        Ok(provider) => Some(Arc::new(
            Orchestrator::builder(Arc::new(provider)).config(config).build(),
        )),
        Err(ProviderError::NotConfigured(reason)) => {
            tracing::warn!(%reason, "No API key; /generate will answer 500 missing_api_key");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let service = Arc::new(GenerationService::new(orchestrator, corpus_limit));
    server::serve(service, bind).await
}

async fn cmd_batch(config: PipelineConfig, batch_config: &Path) -> anyhow::Result<()> {
    let batch = BatchConfig::from_yaml_file(batch_config)
        .with_context(|| format!("loading {}", batch_config.display()))?;
    let provider = OpenAiProvider::from_env(&config.models)?;

    let report = BatchGenerator::new(Arc::new(provider), config, batch)?
        .run()
        .await?;

    println!(
        "Wrote {} questions to {} ({} from cache, {} slots failed, {} tokens, ${:.4})",
        report.generated,
        report.output.display(),
        report.cache_hits,
        report.failures.len(),
        report.usage.total_tokens,
        report.usage.estimated_cost
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.id, failure.reason);
    }
    Ok(())
}

fn cmd_check(config: &PipelineConfig, candidate: &Path, paragraph_file: &Path) -> anyhow::Result<()> {
    let raw: serde_json::Value = serde_yaml::from_str(&read_text(candidate)?)
        .with_context(|| format!("parsing {}", candidate.display()))?;
    let paragraph = read_text(paragraph_file)?;

    let report = match parse_candidate(&raw)
        .and_then(|c| run_local_gates(&c, &paragraph, &config.gates))
    {
        Ok(gates) => CheckReport {
            ok: true,
            overlap_score: Some(gates.overlap_score),
            heuristic_difficulty: Some(gates.heuristic_difficulty),
            error: None,
            code: None,
        },
        Err(e) => CheckReport {
            ok: false,
            overlap_score: None,
            heuristic_difficulty: None,
            error: Some(e.to_string()),
            code: Some(e.code()),
        },
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
