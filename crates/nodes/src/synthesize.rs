//! SYNTHESIZE: render the final article from the blueprint.

use pipeline::{strip_reasoning, Blueprint, PipelineMetrics, Stage, SynthesisFeedback};
use tracing::{info, instrument};

use crate::prompts::{pretty_json, Prompt};
use crate::{NodeContext, NodeError};

/// Writes one article following `blueprint`, with any feedback from earlier
/// failed attempts appended to its synthesis notes.
///
/// Only reasoning markers are removed from the output; the article is prose,
/// so fenced blocks inside it are kept.
#[instrument(name = "stage", skip_all, fields(stage = %Stage::Synthesize, feedback = feedback.entries.len()))]
pub async fn synthesize(
    ctx: &NodeContext,
    blueprint: &Blueprint,
    feedback: &SynthesisFeedback,
    brief: &str,
    brand_guidelines: &str,
    metrics: &mut PipelineMetrics,
) -> Result<String, NodeError> {
    let target = ctx.config.target_word_count.to_string();
    let system = ctx.prompts.render(
        Prompt::SynthesizeSystem,
        &[
            ("brand_guidelines", brand_guidelines),
            ("target_word_count", target.as_str()),
        ],
    );
    let plan = pretty_json(&blueprint.with_feedback(feedback));
    let user = ctx.prompts.render(
        Prompt::SynthesizeUser,
        &[("brief", brief), ("blueprint", plan.as_str())],
    );

    let raw = ctx.call(Stage::Synthesize, &system, &user, metrics).await?;
    let article = strip_reasoning(&raw);
    info!(words = pipeline::word_count(&article), "article synthesized");
    Ok(article)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::{decode_blueprint, decode_validation, DraftId};

    use super::*;
    use crate::testing::{blueprint_response, scripted_context, validation_response, ScriptedProvider};

    fn blueprint() -> Blueprint {
        decode_blueprint(&blueprint_response(DraftId::new(1), DraftId::new(2))).unwrap()
    }

    #[tokio::test]
    async fn renders_prose_and_strips_reasoning_only() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            "<think>outline</think>\n# Maps Made by Everyone\n\n```\nkeep me\n```",
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let article = synthesize(
            &ctx,
            &blueprint(),
            &SynthesisFeedback::default(),
            "the brief",
            "be bold",
            &mut metrics,
        )
        .await
        .unwrap();

        assert_eq!(article, "# Maps Made by Everyone\n\n```\nkeep me\n```");
        let sent = &provider.requests()[0];
        assert!(sent.system.contains("be bold"));
        assert!(sent.system.contains("Approximately 1500 words"));
        assert!(sent.user.contains("the brief"));
        assert_eq!(sent.temperature, 0.7);
        assert_eq!(sent.max_tokens, 8000);
    }

    #[tokio::test]
    async fn feedback_reaches_the_prompt_but_not_the_blueprint() {
        let provider = Arc::new(ScriptedProvider::from_texts(["# Article"]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();
        let blueprint = blueprint();
        let mut feedback = SynthesisFeedback::default();
        let failed = decode_validation(&validation_response(false, 6.0, &["too long", "weak close"]), 7.5).unwrap();
        feedback.record_failure(&failed);

        synthesize(&ctx, &blueprint, &feedback, "brief", "brand", &mut metrics)
            .await
            .unwrap();

        let sent = &provider.requests()[0];
        assert!(sent.user.contains("PREVIOUS ATTEMPT FAILED. Issues: too long, weak close"));
        assert_eq!(blueprint.synthesis_notes, "Keep it tight.");
    }
}
