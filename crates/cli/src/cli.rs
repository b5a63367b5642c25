//! Command-line flags and their mapping onto the run configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use pipeline::{PipelineConfig, RetrySettings, StageSettings};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Generate marketing articles as independent drafts, and optionally
/// synthesize one final article from the best elements of all of them.
#[derive(Debug, Clone, Parser)]
#[command(name = "article-synth", version, about)]
pub struct Cli {
    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_API_BASE")]
    pub api_base: String,

    /// Model identifier sent with every request.
    #[arg(long, env = "OPENAI_MODEL_NAME")]
    pub model: String,

    /// Bearer token for the API, if it needs one.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// File holding the article topic or brief.
    #[arg(long)]
    pub topic_file: PathBuf,

    /// Reference file added to the copywriter's system prompt. Repeatable.
    #[arg(long = "context-file", value_name = "PATH")]
    pub context_files: Vec<PathBuf>,

    /// Directory of `<template>.md` files overriding built-in prompts.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,

    /// Number of drafts to generate.
    #[arg(long, default_value_t = 10)]
    pub drafts: u32,

    /// Sampling temperature for drafts.
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f64,

    /// Output token ceiling for drafts.
    #[arg(long, default_value_t = 4000)]
    pub max_tokens: u32,

    /// Remove reasoning blocks from drafts.
    #[arg(long)]
    pub filter_think: bool,

    /// Attempts per completion call, including the first.
    #[arg(long, default_value_t = 3)]
    pub retry_count: u32,

    /// Seconds between completion attempts.
    #[arg(long, default_value_t = 1.0)]
    pub retry_delay: f64,

    /// Longest server-requested retry pause honoured, in seconds.
    #[arg(long, default_value_t = 30)]
    pub max_retry_after_secs: u64,

    /// Run the synthesis pipeline on the generated drafts.
    #[arg(long)]
    pub synthesize: bool,

    /// Scoring votes per draft.
    #[arg(long, default_value_t = 3)]
    pub synthesis_votes: u32,

    /// Synthesis attempts before accepting a failed validation.
    #[arg(long, default_value_t = 3)]
    pub synthesis_retries: u32,

    /// Approximate length of the synthesized article.
    #[arg(long, default_value_t = 1500)]
    pub target_word_count: u32,

    /// Base name for output files. Nothing is written without it.
    #[arg(long)]
    pub output: Option<String>,

    /// Directory output folders are created under.
    #[arg(long, default_value = "outputs")]
    pub output_root: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; enables trace export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Cli {
    /// The run configuration these flags describe.
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let delay = Duration::try_from_secs_f64(self.retry_delay).map_err(|e| {
            anyhow::anyhow!("--retry-delay must be a non-negative number of seconds: {e}")
        })?;

        let mut config = PipelineConfig {
            draft_count: self.drafts,
            scoring_votes: self.synthesis_votes,
            max_synthesis_attempts: self.synthesis_retries,
            target_word_count: self.target_word_count,
            retry: RetrySettings {
                attempts: self.retry_count,
                delay,
                max_server_delay: Duration::from_secs(self.max_retry_after_secs),
            },
            ..PipelineConfig::default()
        };
        config.stages.draft = StageSettings::new(self.temperature, self.max_tokens);
        config.validate()?;
        Ok(config)
    }

    /// The output base name, checked to be a plain file stem.
    pub fn output_base(&self) -> anyhow::Result<Option<&str>> {
        match self.output.as_deref() {
            None => Ok(None),
            Some(base) if is_plain_stem(base) => Ok(Some(base)),
            Some(base) => anyhow::bail!("--output must be a plain name without path separators, got '{base}'"),
        }
    }
}

fn is_plain_stem(base: &str) -> bool {
    !base.trim().is_empty()
        && base != "."
        && base != ".."
        && !base.contains(['/', '\\'])
}
