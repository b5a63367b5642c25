//! SCORE: repeated rubric votes per card, averaged.

use pipeline::{average_votes, decode_vote, sanitize, Card, PipelineMetrics, Score, Stage};
use tracing::{debug, info, instrument, warn};

use crate::prompts::{pretty_json, Prompt};
use crate::{NodeContext, NodeError};

/// Collects one vote on `card`.
///
/// The vote's overall score is recomputed from the rubric weights; the
/// model's own figure is ignored.
pub async fn score_card(
    ctx: &NodeContext,
    card: &Card,
    metrics: &mut PipelineMetrics,
) -> Result<Score, NodeError> {
    let system = ctx.prompts.render(Prompt::ScoreSystem, &[]);
    let card_json = pretty_json(card);
    let criteria = pretty_json(&ctx.rubric.to_prompt_json());
    let user = ctx.prompts.render(
        Prompt::ScoreUser,
        &[("card", card_json.as_str()), ("criteria", criteria.as_str())],
    );

    let raw = ctx.call(Stage::Score, &system, &user, metrics).await?;
    decode_vote(&sanitize(&raw), card.id, &ctx.rubric).map_err(|source| NodeError::VoteUnreadable {
        draft_id: card.id,
        source,
    })
}

/// Scores every card with `config.scoring_votes` independent votes.
///
/// A failed vote is logged and dropped, never retried. A card whose votes all
/// failed has no score and is left out of the result.
#[instrument(
    name = "stage",
    skip_all,
    fields(stage = %Stage::Score, cards = cards.len(), votes = ctx.config.scoring_votes)
)]
pub async fn score_all_cards_with_voting(
    ctx: &NodeContext,
    cards: &[Card],
    metrics: &mut PipelineMetrics,
) -> Vec<Score> {
    let votes_per_card = ctx.config.scoring_votes;
    let mut scores = Vec::with_capacity(cards.len());

    for card in cards {
        let mut votes = Vec::with_capacity(votes_per_card as usize);
        for vote in 1..=votes_per_card {
            match score_card(ctx, card, metrics).await {
                Ok(score) => {
                    debug!(draft_id = %card.id, vote, overall = score.overall_score, "vote recorded");
                    votes.push(score);
                }
                Err(e) => warn!(draft_id = %card.id, vote, error = %e, "vote failed, dropping it"),
            }
        }

        match average_votes(&votes) {
            Ok(score) => {
                info!(
                    draft_id = %card.id,
                    votes = votes.len(),
                    overall = score.overall_score,
                    "card scored"
                );
                scores.push(score);
            }
            Err(e) => warn!(draft_id = %card.id, error = %e, "dropping card with no usable votes"),
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline::{CompletionResponse, DraftId, LlmError};

    use super::*;
    use crate::testing::{card_response, scripted_context, vote_response, ScriptedProvider};

    fn card(id: u64) -> Card {
        pipeline::decode_card(&card_response(DraftId::new(id)), DraftId::new(id)).unwrap()
    }

    #[tokio::test]
    async fn overall_is_recomputed_from_the_rubric() {
        let inflated = vote_response(8, &["vivid"]).replace("\"article_id\":0", "\"article_id\":0,\"overall_score\":10");
        let provider = Arc::new(ScriptedProvider::from_texts([inflated]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let vote = score_card(&ctx, &card(4), &mut metrics).await.unwrap();

        assert_eq!(vote.id, DraftId::new(4));
        assert_eq!(vote.overall_score, 8.0);
        let sent = &provider.requests()[0];
        assert!(sent.user.contains("hook_strength"));
        assert_eq!(sent.temperature, 0.2);
    }

    #[tokio::test]
    async fn out_of_range_vote_is_unreadable() {
        let provider = Arc::new(ScriptedProvider::from_texts([vote_response(11, &[])]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let err = score_card(&ctx, &card(1), &mut metrics).await.unwrap_err();

        assert!(matches!(err, NodeError::VoteUnreadable { .. }));
    }

    #[tokio::test]
    async fn votes_are_averaged_and_strengths_merged() {
        let provider = Arc::new(ScriptedProvider::from_texts([
            vote_response(6, &["a", "b"]),
            vote_response(8, &["b", "c"]),
            vote_response(7, &[]),
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let scores = score_all_cards_with_voting(&ctx, &[card(1)], &mut metrics).await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].overall_score, 7.0);
        assert_eq!(scores[0].standout_strengths.len(), 3);
        assert_eq!(metrics.stage(Stage::Score).calls, 3);
    }

    #[tokio::test]
    async fn a_card_without_votes_is_dropped() {
        let provider = Arc::new(ScriptedProvider::from_queue([
            Ok(CompletionResponse::text("garbage")),
            Err(LlmError::Serialization("bad body".into())),
            Ok(CompletionResponse::text("{}")),
            Ok(CompletionResponse::text(vote_response(5, &[]))),
            Ok(CompletionResponse::text(vote_response(5, &[]))),
            Ok(CompletionResponse::text(vote_response(5, &[]))),
        ]));
        let ctx = scripted_context(&provider);
        let mut metrics = PipelineMetrics::new();

        let scores = score_all_cards_with_voting(&ctx, &[card(1), card(2)], &mut metrics).await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].id, DraftId::new(2));
        assert_eq!(scores[0].overall_score, 5.0);
    }
}
