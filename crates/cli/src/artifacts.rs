//! Writing drafts and pipeline results to disk.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/<YYYY-MM-DD>/<base>/
//!     <base>.md                            single draft
//!     candidates/<base>_candidate_NN.md    several drafts
//!     <base>_FINAL.md
//!     <base>_validation.json
//!     <base>_pipeline_artifacts.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use nodes::PipelineOutcome;
use pipeline::{
    Blueprint, Card, Draft, PipelineMetrics, PipelineRunId, Score, SynthesisFeedback, Timestamp,
};
use serde::Serialize;
use tracing::info;

/// Metadata stored beside the pipeline records.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata<'a> {
    pub run_id: PipelineRunId,
    pub started_at: Timestamp,
    pub written_at: Timestamp,
    pub model: &'a str,
    pub num_source_articles: usize,
    pub synthesis_attempts: u32,
    pub validation_passed: bool,
}

/// Everything in `<base>_pipeline_artifacts.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineArtifacts<'a> {
    pub cards: &'a [Card],
    pub scores: &'a [Score],
    pub blueprint: &'a Blueprint,
    pub feedback: &'a SynthesisFeedback,
    pub metrics: &'a PipelineMetrics,
    pub metadata: RunMetadata<'a>,
}

/// Writes the files of one run into its dated output folder.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    base: String,
}

impl ArtifactWriter {
    /// Creates `<root>/<date>/<base>/candidates`.
    pub fn create(root: &Path, base: &str, date: NaiveDate) -> anyhow::Result<Self> {
        let dir = root.join(date.format("%Y-%m-%d").to_string()).join(base);
        std::fs::create_dir_all(dir.join("candidates"))
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            base: base.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `draft` is written when `total` drafts were generated.
    pub fn draft_path(&self, draft: &Draft, total: usize) -> PathBuf {
        if total == 1 {
            self.dir.join(format!("{}.md", self.base))
        } else {
            self.dir
                .join("candidates")
                .join(format!("{}_candidate_{:02}.md", self.base, draft.id.as_u64()))
        }
    }

    /// Writes each draft followed by its word count.
    pub fn write_drafts(&self, drafts: &[Draft]) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let path = self.draft_path(draft, drafts.len());
            let body = format!("{}\n\n---\n**Word Count: {}**", draft.text, draft.word_count);
            write(&path, &body)?;
            written.push(path);
        }
        info!(dir = %self.dir.display(), count = written.len(), "drafts saved");
        Ok(written)
    }

    /// Writes the final article, the validation report and the full record
    /// of the run.
    pub fn write_outcome(
        &self,
        outcome: &PipelineOutcome,
        metrics: &PipelineMetrics,
        model: &str,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let final_path = self.dir.join(format!("{}_FINAL.md", self.base));
        write(&final_path, &outcome.article)?;

        let validation_path = self.dir.join(format!("{}_validation.json", self.base));
        write(&validation_path, &to_json(&outcome.validation)?)?;

        let artifacts = PipelineArtifacts {
            cards: &outcome.cards,
            scores: &outcome.scores,
            blueprint: &outcome.blueprint,
            feedback: &outcome.feedback,
            metrics,
            metadata: RunMetadata {
                run_id: outcome.run_id,
                started_at: outcome.started_at,
                written_at: Timestamp::now(),
                model,
                num_source_articles: outcome.source_count,
                synthesis_attempts: outcome.attempts,
                validation_passed: outcome.validation.passed,
            },
        };
        let artifacts_path = self.dir.join(format!("{}_pipeline_artifacts.json", self.base));
        write(&artifacts_path, &to_json(&artifacts)?)?;

        info!(dir = %self.dir.display(), "pipeline artifacts saved");
        Ok(vec![final_path, validation_path, artifacts_path])
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize artifact")
}

fn write(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
