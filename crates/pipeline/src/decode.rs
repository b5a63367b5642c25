//! Schema-checked decoding of model output into typed records.
//!
//! Every decoder follows the same steps: find a JSON object in the sanitized
//! text, check that the required keys are present (reporting all missing keys
//! at once as [`DecodeError::Schema`]), then deserialize into the record type
//! (shape mismatches become [`DecodeError::Parse`]). Values the pipeline owns,
//! such as card ids and overall scores, are filled in locally rather than
//! trusted from the model.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Blueprint, Card, DecodeError, DraftId, Rubric, Score, ValidationResult};

/// Lowest and highest score a single vote may give one criterion.
pub const VOTE_SCORE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=10.0;

/// Parses `text` as a JSON object.
///
/// When the text as a whole is not JSON, the span from the first `{` to the
/// last `}` is tried, which recovers objects surrounded by stray prose.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, DecodeError> {
    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return into_object(value),
        Err(e) => e,
    };

    if let Some(span) = brace_span(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return into_object(value);
        }
    }

    Err(DecodeError::Parse {
        reason: first_error.to_string(),
    })
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn into_object(value: Value) -> Result<Map<String, Value>, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::Parse {
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fails with every key in `required` that `object` lacks.
pub fn require_fields(object: &Map<String, Value>, required: &[&str]) -> Result<(), DecodeError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| !object.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::Schema { missing })
    }
}

fn from_object<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| DecodeError::Parse {
        reason: e.to_string(),
    })
}

/// Decodes an extraction response into the [`Card`] for `draft_id`.
///
/// The model must echo an `article_id`, but the card always carries the id of
/// the draft it was extracted from.
pub fn decode_card(text: &str, draft_id: DraftId) -> Result<Card, DecodeError> {
    let mut object = parse_object(text)?;
    require_fields(&object, Card::REQUIRED_FIELDS)?;
    object.insert("article_id".to_string(), Value::from(draft_id.as_u64()));
    from_object(object)
}

/// Decodes one scoring vote for `draft_id`.
///
/// Each criterion score must be a whole number in [`VOTE_SCORE_RANGE`]. The model's own
/// `overall_score` is discarded and recomputed from `rubric`.
pub fn decode_vote(text: &str, draft_id: DraftId, rubric: &Rubric) -> Result<Score, DecodeError> {
    let mut object = parse_object(text)?;
    require_fields(&object, Score::REQUIRED_FIELDS)?;
    object.insert("article_id".to_string(), Value::from(draft_id.as_u64()));
    let mut vote: Score = from_object(object)?;

    if let Some((name, out_of_range)) = vote
        .scores
        .iter()
        .find(|(_, s)| !VOTE_SCORE_RANGE.contains(&s.score) || s.score.fract() != 0.0)
    {
        return Err(DecodeError::Parse {
            reason: format!(
                "score {} for '{name}' is not a whole number in {}..={}",
                out_of_range.score,
                VOTE_SCORE_RANGE.start(),
                VOTE_SCORE_RANGE.end()
            ),
        });
    }

    vote.overall_score = rubric.weighted_overall(&vote.scores);
    Ok(vote)
}

/// Decodes a selection response into a [`Blueprint`].
///
/// The response carries the plan under `synthesis_blueprint` and the
/// selector's confidence beside it; the two are merged into one record.
pub fn decode_blueprint(text: &str) -> Result<Blueprint, DecodeError> {
    let mut object = parse_object(text)?;
    require_fields(&object, &["synthesis_blueprint", "confidence"])?;

    let confidence = object.remove("confidence").unwrap_or(Value::Null);
    let mut plan = match object.remove("synthesis_blueprint") {
        Some(Value::Object(plan)) => plan,
        Some(other) => {
            return Err(DecodeError::Parse {
                reason: format!(
                    "synthesis_blueprint must be an object, found {}",
                    json_kind(&other)
                ),
            })
        }
        None => Map::new(),
    };

    require_fields(&plan, Blueprint::REQUIRED_FIELDS).map_err(|e| match e {
        DecodeError::Schema { missing } => DecodeError::Schema {
            missing: missing
                .into_iter()
                .map(|key| format!("synthesis_blueprint.{key}"))
                .collect(),
        },
        other => other,
    })?;

    plan.insert("confidence".to_string(), confidence);
    from_object(plan)
}

/// Decodes a validation response, stamping it with the locally computed
/// `target_threshold`.
pub fn decode_validation(text: &str, target_threshold: f64) -> Result<ValidationResult, DecodeError> {
    let object = parse_object(text)?;
    require_fields(&object, ValidationResult::REQUIRED_FIELDS)?;
    let mut result: ValidationResult = from_object(object)?;
    result.target_threshold = target_threshold;
    Ok(result)
}
