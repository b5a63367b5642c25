//! The pipeline executor: EXTRACT → SCORE → SELECT → (SYNTHESIZE → VALIDATE)+.
//!
//! Partial failures below the card and vote level are absorbed by the stages.
//! Everything else (a completion that exhausted its retries, an unusable
//! blueprint, an empty stage) ends the run with an error. A final article
//! that never passed validation is not an error; it comes back as data.

use pipeline::{
    Blueprint, Card, Draft, PipelineMetrics, PipelineRunId, Score, SynthesisFeedback, Timestamp,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use crate::{
    extract_all_cards, score_all_cards_with_voting, select_best_elements, synthesize, validate,
    NodeContext, NodeError,
};

/// Result of the synthesize/validate loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    /// The last article written.
    pub article: String,
    /// The verdict on that article.
    pub validation: ValidationResult,
    /// Synthesis attempts made, at least 1.
    pub attempts: u32,
    /// Feedback carried between attempts.
    pub feedback: SynthesisFeedback,
}

/// Everything one run produced, ready to persist as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: PipelineRunId,
    pub started_at: Timestamp,
    pub source_count: usize,
    pub cards: Vec<Card>,
    pub scores: Vec<Score>,
    pub blueprint: Blueprint,
    pub article: String,
    pub validation: ValidationResult,
    pub attempts: u32,
    pub feedback: SynthesisFeedback,
}

/// Runs the stages in order for one set of drafts.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    ctx: NodeContext,
}

impl PipelineExecutor {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// Runs every stage on `drafts`.
    ///
    /// `brief` is the original topic and `brand_guidelines` the copywriter
    /// context; both go to the synthesizer. Costs are added to `metrics`.
    pub async fn run(
        &self,
        drafts: &[Draft],
        brief: &str,
        brand_guidelines: &str,
        metrics: &mut PipelineMetrics,
    ) -> Result<PipelineOutcome, NodeError> {
        let run_id = PipelineRunId::new_random();
        let span = info_span!("run", run_id = %run_id, drafts = drafts.len());
        self.run_stages(run_id, drafts, brief, brand_guidelines, metrics)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        run_id: PipelineRunId,
        drafts: &[Draft],
        brief: &str,
        brand_guidelines: &str,
        metrics: &mut PipelineMetrics,
    ) -> Result<PipelineOutcome, NodeError> {
        let started_at = Timestamp::now();
        info!(drafts = drafts.len(), model = %self.ctx.gateway.model(), "pipeline started");

        let cards = extract_all_cards(&self.ctx, drafts, metrics).await;
        if cards.is_empty() {
            return Err(NodeError::NoCards);
        }

        let scores = score_all_cards_with_voting(&self.ctx, &cards, metrics).await;
        if let Some(range) = score_range(&scores) {
            info!(lowest = range.0, highest = range.1, scored = scores.len(), "scoring complete");
        }

        let blueprint = select_best_elements(&self.ctx, &cards, &scores, metrics).await?;

        let outcome = self
            .synthesize_with_validation(&blueprint, &scores, brief, brand_guidelines, metrics)
            .await?;

        info!(
            passed = outcome.validation.passed,
            attempts = outcome.attempts,
            overall = outcome.validation.quality_scores.overall,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            run_id,
            started_at,
            source_count: drafts.len(),
            cards,
            scores,
            blueprint,
            article: outcome.article,
            validation: outcome.validation,
            attempts: outcome.attempts,
            feedback: outcome.feedback,
        })
    }

    /// Synthesizes and validates until the validator passes the article or
    /// `config.max_synthesis_attempts` is reached.
    ///
    /// After a failed attempt that will be followed by another, the first few
    /// issues are added to the feedback the next synthesis sees. `blueprint`
    /// itself never changes, and validation always checks against it.
    pub async fn synthesize_with_validation(
        &self,
        blueprint: &Blueprint,
        source_scores: &[Score],
        brief: &str,
        brand_guidelines: &str,
        metrics: &mut PipelineMetrics,
    ) -> Result<SynthesisOutcome, NodeError> {
        let max_attempts = self.ctx.config.max_synthesis_attempts.max(1);
        let mut feedback = SynthesisFeedback::default();
        let mut attempt = 1;

        loop {
            let article = synthesize(
                &self.ctx,
                blueprint,
                &feedback,
                brief,
                brand_guidelines,
                metrics,
            )
            .await?;
            let validation = validate(&self.ctx, &article, blueprint, source_scores, metrics).await?;

            if validation.passed {
                info!(attempt, "validation passed");
                return Ok(SynthesisOutcome {
                    article,
                    validation,
                    attempts: attempt,
                    feedback,
                });
            }

            if attempt == max_attempts {
                warn!(attempts = attempt, "validation never passed, keeping the last article");
                return Ok(SynthesisOutcome {
                    article,
                    validation,
                    attempts: attempt,
                    feedback,
                });
            }

            warn!(attempt, max_attempts, issues = validation.issues.len(), "validation failed, retrying synthesis");
            feedback.record_failure(&validation);
            attempt += 1;
        }
    }
}

fn score_range(scores: &[Score]) -> Option<(f64, f64)> {
    scores.iter().map(|s| s.overall_score).fold(None, |range, v| match range {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::{decode_blueprint, decode_vote, DraftId, PipelineConfig, Rubric, Stage};

    use super::*;
    use crate::testing::{
        blueprint_response, scripted_context_with, validation_response, vote_response,
        ScriptedProvider,
    };

    fn scores() -> Vec<Score> {
        [6, 8]
            .iter()
            .enumerate()
            .map(|(i, v)| {
                decode_vote(&vote_response(*v, &[]), DraftId::new(i as u64 + 1), &Rubric::standard())
                    .unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn single_attempt_budget_returns_the_failed_article() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            "# Only".to_string(),
            validation_response(false, 5.0, &["flat"]),
        ]));
        let config = PipelineConfig {
            max_synthesis_attempts: 1,
            ..PipelineConfig::default()
        };
        let executor = PipelineExecutor::new(scripted_context_with(&provider, config));
        let blueprint = decode_blueprint(&blueprint_response(DraftId::new(1), DraftId::new(2))).unwrap();
        let mut metrics = PipelineMetrics::new();

        let outcome = executor
            .synthesize_with_validation(&blueprint, &scores(), "brief", "brand", &mut metrics)
            .await
            .unwrap();

        assert_eq!(outcome.article, "# Only");
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.validation.passed);
        assert!(outcome.feedback.is_empty());
        assert_eq!(metrics.stage(Stage::Synthesize).calls, 1);
        assert_eq!(metrics.stage(Stage::Validate).calls, 1);
    }

    #[test]
    fn score_range_spans_all_scores() {
        assert_eq!(score_range(&scores()), Some((6.0, 8.0)));
        assert_eq!(score_range(&[]), None);
    }
}
