//! Candidate generation: independent drafts on one brief.

use pipeline::{strip_reasoning, Draft, DraftId, PipelineMetrics, Stage};
use tracing::{info, instrument};

use crate::{NodeContext, NodeError};

/// Generates `count` drafts, numbered from 1.
///
/// Every draft is a separate completion call with the same `system` prompt
/// and `brief`. With `filter_reasoning` set, reasoning blocks are stripped
/// from each draft. Any failure here is fatal.
#[instrument(name = "stage", skip_all, fields(stage = %Stage::Draft, count = count))]
pub async fn generate_drafts(
    ctx: &NodeContext,
    brief: &str,
    system: &str,
    count: u32,
    filter_reasoning: bool,
    metrics: &mut PipelineMetrics,
) -> Result<Vec<Draft>, NodeError> {
    let mut drafts = Vec::with_capacity(count as usize);
    for n in 1..=count {
        let id = DraftId::new(u64::from(n));
        let text = ctx.call(Stage::Draft, system, brief, metrics).await?;
        let text = if filter_reasoning {
            strip_reasoning(&text)
        } else {
            text
        };
        let draft = Draft::new(id, text);
        info!(draft_id = %id, words = draft.word_count, "draft {n}/{count} generated");
        drafts.push(draft);
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{scripted_context, ScriptedProvider};

    #[tokio::test]
    async fn drafts_are_numbered_from_one() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            "first draft",
            "<think>plan</think>\nsecond draft here",
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let drafts = generate_drafts(&ctx, "write about maps", "system", 2, true, &mut metrics)
            .await
            .unwrap();

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].id, DraftId::new(1));
        assert_eq!(drafts[1].id, DraftId::new(2));
        assert_eq!(drafts[1].text, "second draft here");
        assert_eq!(drafts[1].word_count, 3);
        assert_eq!(metrics.stage(Stage::Draft).calls, 2);

        let sent = provider.requests();
        assert_eq!(sent[0].system, "system");
        assert_eq!(sent[0].user, "write about maps");
        assert_eq!(sent[0].temperature, 0.7);
    }

    #[tokio::test]
    async fn reasoning_is_kept_without_filtering() {
        let provider = Arc::new(ScriptedProvider::from_texts(["<think>x</think> body"]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let drafts = generate_drafts(&ctx, "brief", "system", 1, false, &mut metrics)
            .await
            .unwrap();

        assert_eq!(drafts[0].text, "<think>x</think> body");
    }

    #[tokio::test]
    async fn a_failed_call_aborts_generation() {
        let provider = Arc::new(ScriptedProvider::from_texts(["only one"]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let err = generate_drafts(&ctx, "brief", "system", 2, false, &mut metrics)
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::Completion(_)));
    }
}
