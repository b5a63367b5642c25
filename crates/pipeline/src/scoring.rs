//! Vote aggregation and the validation threshold.
//!
//! Both operations are commutative over their inputs: averaging and set union
//! do not depend on the order votes arrived in, so votes may be collected in
//! any order (or concurrently) without changing the aggregate.

use std::collections::BTreeMap;

use crate::{round_to, AggregationError, CriterionName, CriterionScore, Score};

/// Margin by which the final article must beat the average source.
pub const THRESHOLD_MARGIN: f64 = 0.5;

/// Averages several votes on the same card into one [`Score`].
///
/// - Each criterion's score is the mean over the votes that contain that
///   criterion, rounded to one decimal. Its justification is the first one
///   seen.
/// - `overall_score` is the mean of the votes' overall scores, rounded to two
///   decimals.
/// - Strengths and weaknesses are the de-duplicated union across votes.
pub fn average_votes(votes: &[Score]) -> Result<Score, AggregationError> {
    let first = votes.first().ok_or(AggregationError::NoVotes)?;

    let mut sums: BTreeMap<&CriterionName, (f64, usize, &str)> = BTreeMap::new();
    for vote in votes {
        for (name, criterion) in &vote.scores {
            let entry = sums
                .entry(name)
                .or_insert((0.0, 0, criterion.justification.as_str()));
            entry.0 += criterion.score;
            entry.1 += 1;
        }
    }

    let scores = sums
        .into_iter()
        .map(|(name, (sum, count, justification))| {
            (
                name.clone(),
                CriterionScore {
                    score: round_to(sum / count as f64, 1),
                    justification: justification.to_string(),
                },
            )
        })
        .collect();

    let overall_sum: f64 = votes.iter().map(|v| v.overall_score).sum();

    let mut standout_strengths = first.standout_strengths.clone();
    let mut critical_weaknesses = first.critical_weaknesses.clone();
    for vote in &votes[1..] {
        standout_strengths.extend(vote.standout_strengths.iter().cloned());
        critical_weaknesses.extend(vote.critical_weaknesses.iter().cloned());
    }

    Ok(Score {
        id: first.id,
        scores,
        overall_score: round_to(overall_sum / votes.len() as f64, 2),
        standout_strengths,
        critical_weaknesses,
    })
}

/// The overall score the final article has to reach: the mean of the source
/// scores plus [`THRESHOLD_MARGIN`].
///
/// The bar is set against the average source, not the best one.
pub fn target_threshold(source_scores: &[Score]) -> Result<f64, AggregationError> {
    if source_scores.is_empty() {
        return Err(AggregationError::NoScores);
    }
    let sum: f64 = source_scores.iter().map(|s| s.overall_score).sum();
    Ok(sum / source_scores.len() as f64 + THRESHOLD_MARGIN)
}
