//! `article-synth` entry point.
//!
//! This binary is the composition root. It:
//!
//! 1. Parses flags (with environment fallbacks) into a validated
//!    [`pipeline::PipelineConfig`].
//! 2. Installs the `tracing` subscriber and, when an OTLP endpoint is given,
//!    the OpenTelemetry exporter.
//! 3. Assembles the copywriter system prompt from the context files and
//!    applies any prompt overrides.
//! 4. Builds the HTTP provider, wraps it in the retrying gateway and hands
//!    everything to the stages as a [`nodes::NodeContext`].
//! 5. Generates drafts and, with `--synthesize`, runs the synthesis pipeline
//!    on them, writing artifacts when `--output` is set.

mod artifacts;
mod cli;
mod inputs;
mod observability;
mod summary;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use llm::{OpenAiCompatibleProvider, OpenAiConfig};
use nodes::{generate_drafts, LlmGateway, NodeContext, PipelineExecutor, PromptLibrary};
use pipeline::{PipelineMetrics, Rubric};
use tracing::{info, warn};

use crate::artifacts::ArtifactWriter;
use crate::cli::Cli;

/// Below this many drafts the selector has little to choose from.
const RECOMMENDED_MIN_DRAFTS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let _guard = observability::init(args.log_format, args.verbose, args.otlp_endpoint.as_deref())?;

    if let Err(e) = run(&args).await {
        tracing::error!("run failed: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(args: &Cli) -> anyhow::Result<()> {
    let config = args.pipeline_config()?;
    let output_base = args.output_base()?;

    let topic = inputs::read_text(&args.topic_file).context("failed to read topic file")?;

    let mut prompts = PromptLibrary::new();
    if let Some(dir) = &args.prompt_dir {
        inputs::load_prompt_overrides(dir, &mut prompts)?;
    }
    let system = inputs::build_system_prompt(&prompts, &args.context_files)?;
    info!(
        context_files = args.context_files.len(),
        system_chars = system.len(),
        "system prompt assembled"
    );

    let provider = OpenAiCompatibleProvider::new(OpenAiConfig {
        api_base: args.api_base.clone(),
        model: args.model.clone(),
        api_key: args.api_key.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
    })
    .context("failed to build completion provider")?;
    info!(endpoint = provider.endpoint(), model = %args.model, "completion provider ready");

    let gateway = LlmGateway::new(Arc::new(provider), config.retry);
    let ctx = NodeContext::new(gateway, prompts, Rubric::standard(), config.clone())
        .context("invalid run configuration")?;

    let writer = output_base
        .map(|base| ArtifactWriter::create(&args.output_root, base, chrono::Local::now().date_naive()))
        .transpose()?;

    let mut metrics = PipelineMetrics::new();
    let drafts = generate_drafts(
        &ctx,
        &topic,
        &system,
        config.draft_count,
        args.filter_think,
        &mut metrics,
    )
    .await
    .context("draft generation failed")?;
    info!(count = drafts.len(), "drafts generated");

    if let Some(writer) = &writer {
        writer.write_drafts(&drafts)?;
    }

    if !args.synthesize {
        summary::log_metrics(&metrics);
        return Ok(());
    }

    if config.draft_count < RECOMMENDED_MIN_DRAFTS {
        warn!(
            drafts = config.draft_count,
            recommended = RECOMMENDED_MIN_DRAFTS,
            "synthesizing from fewer drafts than recommended"
        );
    }

    let executor = PipelineExecutor::new(ctx);
    let outcome = executor
        .run(&drafts, &topic, &system, &mut metrics)
        .await
        .context("synthesis pipeline failed")?;

    if let Some(writer) = &writer {
        writer.write_outcome(&outcome, &metrics, &args.model)?;
    }

    summary::log_outcome(&outcome);
    summary::log_metrics(&metrics);
    Ok(())
}
