//! Civic research pipeline CLI.
//!
//! `civiclink ask` runs one question through the research workflow, reporting
//! progress on stderr and printing the markdown answer on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use uuid::Uuid;

use civiclink::core::freshness;
use civiclink::core::trust::classify_url;
use civiclink::core::types::{SearchResult, ValidationVerdict};
use civiclink::driver::{DriverOutcome, run_query};
use civiclink::exit_codes;
use civiclink::io::codex::CodexBackend;
use civiclink::io::config::{DEFAULT_CONFIG_FILE, PipelineConfig, load_config, write_config};
use civiclink::io::prompt::{
    PromptBuilder, RefinementInputs, RejectedSource, SynthesisInputs, ValidationInputs,
};
use civiclink::logging;
use civiclink::pipeline::Pipeline;

const SAMPLE_QUERY: &str = "Can I grow a tree in my backyard in County X?";
const SAMPLE_CONTENT: &str = "We planted a maple last spring. I don't think you need a permit, \
     but check with your HOA first.";

#[derive(Parser)]
#[command(
    name = "civiclink",
    version,
    about = "Agentic research for civic and policy questions"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Research a question and print the markdown answer.
    Ask {
        /// The question to research.
        query: String,
        /// User identifier attached to the session; random when omitted.
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Render a stage prompt against sample data.
    Prompt {
        stage: PromptStage,
        /// Question to render the prompt for.
        #[arg(long, default_value = SAMPLE_QUERY)]
        query: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PromptStage {
    Search,
    Validation,
    Refinement,
    Synthesis,
}

#[tokio::main]
async fn main() {
    logging::init("warn");
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Ask { query, user_id } => cmd_ask(&cli.config, &query, user_id).await,
        Command::Prompt { stage, query } => cmd_prompt(&cli.config, stage, &query),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        println!("{} already exists", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &PipelineConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

async fn cmd_ask(path: &Path, query: &str, user_id: Option<String>) -> Result<i32> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let config = load_config(path)?;
    debug!(?config, "loaded config");
    let user_id = user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let pipeline = Pipeline::new(CodexBackend::new(config.backend.clone()), &config);

    let outcome = run_query(&pipeline, &user_id, query, |update| {
        eprintln!("{update}");
    })
    .await;

    println!("{}", outcome.text());
    Ok(match outcome {
        DriverOutcome::Answered { .. } => exit_codes::OK,
        DriverOutcome::NoAnswer => exit_codes::NO_ANSWER,
        DriverOutcome::Failed { error } => {
            eprintln!("error: {error}");
            exit_codes::FAILED
        }
    })
}

fn cmd_prompt(path: &Path, stage: PromptStage, query: &str) -> Result<i32> {
    let config = load_config(path)?;
    let prompts = PromptBuilder::new(config.prompt_budget_bytes);
    let candidate = sample_candidate(query);
    let prompt = match stage {
        PromptStage::Search => prompts.build_search(query)?,
        PromptStage::Validation => {
            let source = classify_url(&candidate.url);
            prompts.build_validation(&ValidationInputs {
                query,
                candidate: &candidate,
                source: &source,
                freshness: freshness::assess(
                    query,
                    &candidate.timestamp,
                    chrono::Utc::now().date_naive(),
                    config.stale_after_days,
                ),
                threshold: config.approval_threshold,
            })?
        }
        PromptStage::Refinement => {
            let verdict = ValidationVerdict::rejected(
                "Personal blog with no official standing; low trust.",
                0.4,
            );
            let rejected = vec![RejectedSource {
                url: candidate.url.clone(),
                analysis: verdict.analysis.clone(),
            }];
            prompts.build_refinement(&RefinementInputs {
                query,
                verdict: &verdict,
                rejected_url: &candidate.url,
                rejected: &rejected,
            })?
        }
        PromptStage::Synthesis => prompts.build_synthesis(&SynthesisInputs {
            query,
            source_url: &candidate.url,
            content: &candidate.raw_content,
            approved: true,
        })?,
    };
    println!("{prompt}");
    Ok(exit_codes::OK)
}

fn sample_candidate(query: &str) -> SearchResult {
    SearchResult {
        search_results: vec!["https://gardening.blogspot.com/backyard-trees".to_string()],
        url: "https://gardening.blogspot.com/backyard-trees".to_string(),
        raw_content: SAMPLE_CONTENT.to_string(),
        query: query.to_string(),
        timestamp: "2019-06-01".to_string(),
        reasoning: "Top search result for the question.".to_string(),
    }
}
