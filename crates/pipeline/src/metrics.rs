//! Per-stage call accounting.
//!
//! A [`PipelineMetrics`] is an explicit value owned by whoever runs the
//! pipeline and passed by `&mut` into each stage. Stages fold one
//! [`CallRecord`] per completed completion call into it. All accumulation is
//! additive, so two aggregates collected independently can be combined with
//! [`PipelineMetrics::merge`] in any order.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TokenCount;

/// The pipeline stage a completion call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Draft,
    Extract,
    Score,
    Select,
    Synthesize,
    Validate,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Draft,
        Stage::Extract,
        Stage::Score,
        Stage::Select,
        Stage::Synthesize,
        Stage::Validate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Draft => "draft",
            Stage::Extract => "extract",
            Stage::Score => "score",
            Stage::Select => "select",
            Stage::Synthesize => "synthesize",
            Stage::Validate => "validate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one completion call cost, whether or not it produced text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallRecord {
    pub words_in: u64,
    pub words_out: u64,
    pub prompt_tokens: TokenCount,
    pub completion_tokens: TokenCount,
    pub latency: Duration,
    /// Attempts the call made; `1` means it ended after the first.
    pub attempts: u32,
    /// The call ended without text.
    pub failed: bool,
}

/// Running totals for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub calls: u64,
    pub retries: u64,
    #[serde(default)]
    pub failures: u64,
    pub words_in: u64,
    pub words_out: u64,
    pub prompt_tokens: TokenCount,
    pub completion_tokens: TokenCount,
    pub latency_ms: u64,
}

impl StageMetrics {
    pub fn record(&mut self, call: &CallRecord) {
        self.calls += 1;
        self.retries += u64::from(call.attempts.saturating_sub(1));
        self.failures += u64::from(call.failed);
        self.words_in += call.words_in;
        self.words_out += call.words_out;
        self.prompt_tokens += call.prompt_tokens;
        self.completion_tokens += call.completion_tokens;
        self.latency_ms += u64::try_from(call.latency.as_millis()).unwrap_or(u64::MAX);
    }

    pub fn merge(&mut self, other: &StageMetrics) {
        self.calls += other.calls;
        self.retries += other.retries;
        self.failures += other.failures;
        self.words_in += other.words_in;
        self.words_out += other.words_out;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.latency_ms = self.latency_ms.saturating_add(other.latency_ms);
    }
}

/// Totals for every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    stages: BTreeMap<Stage, StageMetrics>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one completed call into `stage`'s totals.
    pub fn record(&mut self, stage: Stage, call: &CallRecord) {
        self.stages.entry(stage).or_default().record(call);
    }

    /// Adds every stage total of `other` into `self`.
    pub fn merge(&mut self, other: &PipelineMetrics) {
        for (stage, metrics) in &other.stages {
            self.stages.entry(*stage).or_default().merge(metrics);
        }
    }

    /// Totals for `stage`; all zero if the stage made no calls.
    pub fn stage(&self, stage: Stage) -> StageMetrics {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Stages that made at least one call, in execution order.
    pub fn stages(&self) -> impl Iterator<Item = (Stage, &StageMetrics)> {
        self.stages.iter().map(|(s, m)| (*s, m))
    }

    /// Sum over all stages.
    pub fn total(&self) -> StageMetrics {
        let mut total = StageMetrics::default();
        for metrics in self.stages.values() {
            total.merge(metrics);
        }
        total
    }
}
