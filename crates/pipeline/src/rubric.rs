//! The weighted scoring rubric.
//!
//! A [`Rubric`] is validated once when it is built: names are unique and
//! non-blank, weights are finite and non-negative, and the weights sum to 1.
//! Everything downstream (vote scoring, the selector's input, the validator's
//! re-score) can then rely on those invariants.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{round_to, ConfigError, CriterionName, CriterionScore};

/// One rubric criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: CriterionName,
    pub description: String,
    pub weight: f64,
}

/// An ordered, validated set of weighted criteria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rubric {
    criteria: Vec<Criterion>,
}

impl Rubric {
    /// Allowed distance between the weight sum and 1.0.
    pub const WEIGHT_TOLERANCE: f64 = 1e-9;

    /// Builds a rubric, rejecting duplicate names, bad weights, and weight
    /// sums other than 1.
    pub fn new(criteria: Vec<Criterion>) -> Result<Self, ConfigError> {
        if criteria.is_empty() {
            return Err(ConfigError::ZeroCount {
                field: "rubric.criteria",
            });
        }

        let mut seen = HashSet::new();
        for criterion in &criteria {
            if !seen.insert(criterion.name.as_str()) {
                return Err(ConfigError::InvalidCriterion {
                    name: criterion.name.to_string(),
                    reason: "duplicate name".to_string(),
                });
            }
            if !criterion.weight.is_finite() || criterion.weight < 0.0 {
                return Err(ConfigError::InvalidCriterion {
                    name: criterion.name.to_string(),
                    reason: format!("weight {} is not a finite non-negative number", criterion.weight),
                });
            }
        }

        let sum: f64 = criteria.iter().map(|c| c.weight).sum();
        if (sum - 1.0).abs() > Self::WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }

        Ok(Self { criteria })
    }

    /// The fixed seven-criterion marketing-article rubric.
    pub fn standard() -> Self {
        let criteria = STANDARD_CRITERIA
            .iter()
            .filter_map(|(name, description, weight)| {
                Some(Criterion {
                    name: CriterionName::new(*name)?,
                    description: (*description).to_string(),
                    weight: *weight,
                })
            })
            .collect();
        Self { criteria }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Returns the weight of `name`, or `None` if it is not in the rubric.
    pub fn weight_of(&self, name: &CriterionName) -> Option<f64> {
        self.criteria
            .iter()
            .find(|c| &c.name == name)
            .map(|c| c.weight)
    }

    pub fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    /// Weighted overall score of one vote, rounded to two decimals.
    ///
    /// Only criteria present in both the rubric and `scores` contribute; a
    /// criterion the model skipped contributes nothing, and one the model
    /// invented is ignored.
    pub fn weighted_overall(&self, scores: &BTreeMap<CriterionName, CriterionScore>) -> f64 {
        let total: f64 = self
            .criteria
            .iter()
            .filter_map(|c| scores.get(&c.name).map(|s| s.score * c.weight))
            .sum();
        round_to(total, 2)
    }

    /// The rubric as the JSON object given to the model:
    /// `{name: {description, weight}}`.
    pub fn to_prompt_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .criteria
            .iter()
            .map(|c| {
                (
                    c.name.to_string(),
                    serde_json::json!({
                        "description": c.description,
                        "weight": c.weight,
                    }),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Default for Rubric {
    fn default() -> Self {
        Self::standard()
    }
}

const STANDARD_CRITERIA: &[(&str, &str, f64)] = &[
    (
        "hook_strength",
        "How compelling is the opening? Does it create curiosity, tension, or immediate value?",
        0.15,
    ),
    (
        "argument_clarity",
        "Is the core message immediately clear? Can it be summarized in one sentence?",
        0.20,
    ),
    (
        "evidence_quality",
        "Are claims supported with specifics: statistics, examples, case studies?",
        0.15,
    ),
    (
        "structural_coherence",
        "Does the structure serve the argument? Is there a logical flow?",
        0.15,
    ),
    (
        "originality",
        "Does it offer a fresh angle, or is it generic advice anyone could write?",
        0.15,
    ),
    (
        "memorability",
        "Are there phrases or ideas that stick? Would someone quote this?",
        0.10,
    ),
    (
        "actionability",
        "Does the reader know what to do after reading? Is there a clear next step?",
        0.10,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CriterionName {
        CriterionName::new(s).unwrap()
    }

    fn all_scored(rubric: &Rubric, value: f64) -> BTreeMap<CriterionName, CriterionScore> {
        rubric
            .criteria()
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    CriterionScore {
                        score: value,
                        justification: String::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn standard_rubric_weights_sum_to_one() {
        let rubric = Rubric::standard();
        assert_eq!(rubric.criteria().len(), 7);
        assert!((rubric.total_weight() - 1.0).abs() <= Rubric::WEIGHT_TOLERANCE);
        assert!(Rubric::new(rubric.criteria().to_vec()).is_ok());
    }

    #[test]
    fn uniform_eights_score_eight_overall() {
        let rubric = Rubric::standard();
        assert_eq!(rubric.weighted_overall(&all_scored(&rubric, 8.0)), 8.0);
    }

    #[test]
    fn weighted_overall_uses_only_known_criteria() {
        let rubric = Rubric::standard();
        let mut scores = BTreeMap::new();
        scores.insert(
            name("argument_clarity"),
            CriterionScore {
                score: 9.0,
                justification: "crisp".into(),
            },
        );
        scores.insert(
            name("made_up"),
            CriterionScore {
                score: 10.0,
                justification: String::new(),
            },
        );
        // 9 * 0.20, nothing from the unknown criterion or the missing six.
        assert_eq!(rubric.weighted_overall(&scores), 1.8);
    }

    #[test]
    fn mixed_scores_round_to_two_decimals() {
        let rubric = Rubric::standard();
        let values = [7.0, 6.0, 9.0, 5.0, 8.0, 3.0, 7.0];
        let scores = rubric
            .criteria()
            .iter()
            .zip(values)
            .map(|(c, v)| {
                (
                    c.name.clone(),
                    CriterionScore {
                        score: v,
                        justification: String::new(),
                    },
                )
            })
            .collect();
        // 1.05 + 1.2 + 1.35 + 0.75 + 1.2 + 0.3 + 0.7
        assert_eq!(rubric.weighted_overall(&scores), 6.55);
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let criteria = vec![
            Criterion {
                name: name("a"),
                description: String::new(),
                weight: 0.5,
            },
            Criterion {
                name: name("b"),
                description: String::new(),
                weight: 0.4,
            },
        ];
        assert!(matches!(
            Rubric::new(criteria),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let criteria = vec![
            Criterion {
                name: name("a"),
                description: String::new(),
                weight: 0.5,
            },
            Criterion {
                name: name("a"),
                description: String::new(),
                weight: 0.5,
            },
        ];
        assert!(matches!(
            Rubric::new(criteria),
            Err(ConfigError::InvalidCriterion { .. })
        ));
    }

    #[test]
    fn prompt_json_lists_every_criterion() {
        let json = Rubric::standard().to_prompt_json();
        assert_eq!(json["argument_clarity"]["weight"], 0.20);
        assert_eq!(json.as_object().unwrap().len(), 7);
    }
}
