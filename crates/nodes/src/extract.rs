//! EXTRACT: one structured card per draft.

use pipeline::{decode_card, sanitize, Card, DecodeError, Draft, PipelineMetrics, Stage};
use tracing::{debug, info, instrument, warn};

use crate::prompts::Prompt;
use crate::{NodeContext, NodeError};

/// Extracts the card for one draft.
///
/// A response that does not decode into a card is retried with a fresh
/// request, up to `config.extraction_attempts` requests in total. Completion
/// failures are not retried here; the gateway already did.
pub async fn extract_card(
    ctx: &NodeContext,
    draft: &Draft,
    metrics: &mut PipelineMetrics,
) -> Result<Card, NodeError> {
    let system = ctx.prompts.render(Prompt::ExtractSystem, &[]);
    let id = draft.id.to_string();
    let user = ctx.prompts.render(
        Prompt::ExtractUser,
        &[("article_id", id.as_str()), ("article", draft.text.as_str())],
    );

    let attempts = ctx.config.extraction_attempts.max(1);
    let mut last = DecodeError::Parse {
        reason: "no attempt made".into(),
    };

    for attempt in 1..=attempts {
        let raw = ctx.call(Stage::Extract, &system, &user, metrics).await?;
        match decode_card(&sanitize(&raw), draft.id) {
            Ok(card) => {
                debug!(draft_id = %draft.id, attempt, "card extracted");
                return Ok(card);
            }
            Err(e) => {
                warn!(draft_id = %draft.id, attempt, max_attempts = attempts, error = %e, "card did not decode");
                last = e;
            }
        }
    }

    Err(NodeError::ExtractionFailed {
        draft_id: draft.id,
        attempts,
        last,
    })
}

/// Extracts cards for every draft, in order.
///
/// A draft whose extraction fails for any reason is logged and left out, so
/// the result may be shorter than `drafts` but never longer.
#[instrument(name = "stage", skip_all, fields(stage = %Stage::Extract, drafts = drafts.len()))]
pub async fn extract_all_cards(
    ctx: &NodeContext,
    drafts: &[Draft],
    metrics: &mut PipelineMetrics,
) -> Vec<Card> {
    let mut cards = Vec::with_capacity(drafts.len());
    for draft in drafts {
        match extract_card(ctx, draft, metrics).await {
            Ok(card) => cards.push(card),
            Err(e) => warn!(draft_id = %draft.id, error = %e, "dropping draft"),
        }
    }
    info!(extracted = cards.len(), total = drafts.len(), "extraction complete");
    cards
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::{CompletionResponse, DraftId, LlmError, PipelineConfig};

    use super::*;
    use crate::testing::{card_response, scripted_context, scripted_context_with, ScriptedProvider};

    fn draft(id: u64) -> Draft {
        Draft::new(DraftId::new(id), format!("Draft number {id} about community maps."))
    }

    #[tokio::test]
    async fn extracts_a_fenced_card_and_keeps_the_draft_id() {
        let wrapped = format!("<think>hmm</think>\n```json\n{}\n```", card_response(DraftId::new(42)));
        let provider = Arc::new(ScriptedProvider::from_texts([wrapped]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let card = extract_card(&ctx, &draft(3), &mut metrics).await.unwrap();

        assert_eq!(card.id, DraftId::new(3));
        assert_eq!(card.key_points.len(), 3);
        assert_eq!(metrics.stage(Stage::Extract).calls, 1);

        let sent = &provider.requests()[0];
        assert!(sent.user.contains("Article #3"));
        assert!(sent.user.contains("Draft number 3"));
        assert_eq!(sent.temperature, 0.3);
    }

    #[tokio::test]
    async fn undecodable_responses_are_retried() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            "not json at all".to_string(),
            r#"{"article_id": 1, "tone": "dry"}"#.to_string(),
            card_response(DraftId::new(1)),
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let card = extract_card(&ctx, &draft(1), &mut metrics).await.unwrap();

        assert_eq!(card.tone, "conversational");
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            r#"{"article_id": 1}"#,
            r#"{"article_id": 1}"#,
        ]));
        let config = PipelineConfig {
            extraction_attempts: 2,
            ..PipelineConfig::default()
        };
        let ctx = scripted_context_with(&provider, config);
        let mut metrics = PipelineMetrics::new();

        let err = extract_card(&ctx, &draft(1), &mut metrics).await.unwrap_err();

        match err {
            NodeError::ExtractionFailed {
                draft_id,
                attempts,
                last: DecodeError::Schema { missing },
            } => {
                assert_eq!(draft_id, DraftId::new(1));
                assert_eq!(attempts, 2);
                assert!(missing.contains(&"opening_hook".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_drafts_are_dropped() {
        let provider = Arc::new(ScriptedProvider::from_queue([
            Ok(CompletionResponse::text(card_response(DraftId::new(1)))),
            Err(LlmError::Status {
                status: 400,
                body: "context too long".into(),
                retry_after: None,
            }),
            Ok(CompletionResponse::text(card_response(DraftId::new(3)))),
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let cards = extract_all_cards(&ctx, &[draft(1), draft(2), draft(3)], &mut metrics).await;

        let ids: Vec<DraftId> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![DraftId::new(1), DraftId::new(3)]);
    }
}
