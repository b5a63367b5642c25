//! VALIDATE: judge the article against its blueprint and the quality bar.

use pipeline::{
    decode_validation, sanitize, target_threshold, Blueprint, PipelineMetrics, Score, Stage,
    ValidationResult,
};
use tracing::{info, instrument, warn};

use crate::prompts::{pretty_json, Prompt};
use crate::{NodeContext, NodeError};

/// Validates `article` against `blueprint`.
///
/// The bar is the mean overall score of `source_scores` plus the fixed
/// margin, and is stamped on the result. `passed` and `threshold_met` are the
/// model's verdict and are returned as given; a `threshold_met` that
/// contradicts the reported overall score is logged, not corrected.
#[instrument(name = "stage", skip_all, fields(stage = %Stage::Validate))]
pub async fn validate(
    ctx: &NodeContext,
    article: &str,
    blueprint: &Blueprint,
    source_scores: &[Score],
    metrics: &mut PipelineMetrics,
) -> Result<ValidationResult, NodeError> {
    let threshold = target_threshold(source_scores)?;
    let threshold_text = format!("{threshold:.1}");
    let criteria = pretty_json(&ctx.rubric.to_prompt_json());
    let plan = pretty_json(blueprint);

    let system = ctx.prompts.render(
        Prompt::ValidateSystem,
        &[
            ("target_threshold", threshold_text.as_str()),
            ("criteria", criteria.as_str()),
        ],
    );
    let user = ctx.prompts.render(
        Prompt::ValidateUser,
        &[
            ("article", article),
            ("blueprint", plan.as_str()),
            ("target_threshold", threshold_text.as_str()),
        ],
    );

    let raw = ctx.call(Stage::Validate, &system, &user, metrics).await?;
    let result =
        decode_validation(&sanitize(&raw), threshold).map_err(NodeError::ValidationUnreadable)?;

    if result.threshold_met != result.overall_clears_threshold() {
        warn!(
            overall = result.quality_scores.overall,
            threshold,
            threshold_met = result.threshold_met,
            "validator's threshold verdict disagrees with its overall score"
        );
    }
    info!(
        passed = result.passed,
        overall = result.quality_scores.overall,
        threshold,
        issues = result.issues.len(),
        "article validated"
    );
    Ok(result)
}
