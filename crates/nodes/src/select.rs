//! SELECT: one recombination blueprint from every scored card.

use std::collections::{BTreeMap, HashMap};

use pipeline::{
    decode_blueprint, sanitize, AggregationError, Blueprint, Card, CriterionName, DraftId,
    PipelineMetrics, Score, Stage,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::prompts::{pretty_json, Prompt};
use crate::{NodeContext, NodeError};

/// Characters of a card's opening hook shown to the selector.
pub const OPENING_HOOK_PREVIEW_CHARS: usize = 200;

/// The compressed view of one scored card the selector sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionEntry<'a> {
    pub article_id: DraftId,
    pub headline_candidates: &'a [String],
    pub opening_hook: String,
    pub core_argument: &'a str,
    pub key_points: &'a [String],
    pub structural_approach: &'a str,
    pub memorable_phrases: &'a [String],
    pub scores: BTreeMap<CriterionName, f64>,
    pub overall_score: f64,
}

impl<'a> SelectionEntry<'a> {
    pub fn new(card: &'a Card, score: &Score) -> Self {
        Self {
            article_id: card.id,
            headline_candidates: &card.headline_candidates,
            opening_hook: preview(&card.opening_hook, OPENING_HOOK_PREVIEW_CHARS),
            core_argument: &card.core_argument,
            key_points: &card.key_points,
            structural_approach: &card.structural_approach,
            memorable_phrases: &card.memorable_phrases,
            scores: score.criterion_values(),
            overall_score: score.overall_score,
        }
    }
}

/// Pairs each card with the score carrying the same id, in card order.
///
/// Cards without a score are left out.
pub fn pair_by_id<'a>(cards: &'a [Card], scores: &'a [Score]) -> Vec<(&'a Card, &'a Score)> {
    let by_id: HashMap<DraftId, &Score> = scores.iter().map(|s| (s.id, s)).collect();
    cards
        .iter()
        .filter_map(|card| match by_id.get(&card.id) {
            Some(score) => Some((card, *score)),
            None => {
                warn!(draft_id = %card.id, "card has no score, leaving it out of selection");
                None
            }
        })
        .collect()
}

/// Builds the blueprint with a single completion call.
///
/// There is no retry here: an unusable response fails the run with
/// [`NodeError::SelectionFailed`].
#[instrument(name = "stage", skip_all, fields(stage = %Stage::Select, cards = cards.len()))]
pub async fn select_best_elements(
    ctx: &NodeContext,
    cards: &[Card],
    scores: &[Score],
    metrics: &mut PipelineMetrics,
) -> Result<Blueprint, NodeError> {
    let entries: Vec<SelectionEntry<'_>> = pair_by_id(cards, scores)
        .into_iter()
        .map(|(card, score)| SelectionEntry::new(card, score))
        .collect();
    if entries.is_empty() {
        return Err(AggregationError::NoScores.into());
    }

    let count = entries.len().to_string();
    let summaries = pretty_json(&entries);
    let system = ctx.prompts.render(Prompt::SelectSystem, &[]);
    let user = ctx.prompts.render(
        Prompt::SelectUser,
        &[("count", count.as_str()), ("summaries", summaries.as_str())],
    );

    let raw = ctx.call(Stage::Select, &system, &user, metrics).await?;
    let blueprint = decode_blueprint(&sanitize(&raw)).map_err(NodeError::SelectionFailed)?;

    info!(
        headline_source = %blueprint.selected_headline.source_article,
        structure_source = %blueprint.selected_structure.source_article,
        sources = blueprint.source_ids().len(),
        confidence = %blueprint.confidence.level,
        "blueprint selected"
    );
    Ok(blueprint)
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
