//! The records each pipeline stage produces.
//!
//! All records are plain, fully serializable data so a collaborator can
//! persist them verbatim. Field names on the wire are the snake_case names the
//! prompts ask the model to emit; where the Rust name differs a `serde(rename)`
//! maps between them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{word_count, CriterionName, DraftId};

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// One independently generated candidate article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub text: String,
    pub word_count: u64,
}

impl Draft {
    /// Creates a draft, counting its words.
    pub fn new(id: DraftId, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = word_count(&text);
        Self {
            id,
            text,
            word_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// Structured extraction of one [`Draft`].
///
/// `memorable_phrases` are requested verbatim from the draft; nothing checks
/// that they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "article_id")]
    pub id: DraftId,
    pub headline_candidates: Vec<String>,
    pub opening_hook: String,
    pub core_argument: String,
    pub key_points: Vec<String>,
    pub memorable_phrases: Vec<String>,
    pub structural_approach: String,
    pub evidence_used: Vec<String>,
    pub tone: String,
    #[serde(rename = "target_audience_signals")]
    pub audience_signals: String,
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub word_count_estimate: Option<u64>,
}

impl Card {
    /// Keys the model must emit for a card to be accepted.
    pub const REQUIRED_FIELDS: &'static [&'static str] = &[
        "article_id",
        "headline_candidates",
        "opening_hook",
        "core_argument",
        "key_points",
        "memorable_phrases",
        "structural_approach",
        "evidence_used",
        "tone",
        "target_audience_signals",
        "weaknesses",
    ];
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// One criterion's judgment.
///
/// A single vote carries an integer in `1..=10`; an aggregated score carries
/// the vote mean rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: f64,
    #[serde(default)]
    pub justification: String,
}

/// A rubric judgment of one card.
///
/// The same shape is used for a single vote and for the aggregate of several
/// votes. `overall_score` is always computed locally from the rubric weights,
/// never taken from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "article_id")]
    pub id: DraftId,
    pub scores: BTreeMap<CriterionName, CriterionScore>,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub standout_strengths: BTreeSet<String>,
    #[serde(default)]
    pub critical_weaknesses: BTreeSet<String>,
}

impl Score {
    /// Keys the model must emit for a vote to be accepted.
    pub const REQUIRED_FIELDS: &'static [&'static str] = &["scores"];

    /// Returns the per-criterion score values, without justifications.
    pub fn criterion_values(&self) -> BTreeMap<CriterionName, f64> {
        self.scores
            .iter()
            .map(|(name, s)| (name.clone(), s.score))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// The headline chosen for the final article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedHeadline {
    pub source_article: DraftId,
    pub headline: String,
    #[serde(default)]
    pub rationale: String,
}

/// The opening approach chosen for the final article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedOpening {
    pub source_article: DraftId,
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub key_elements: Vec<String>,
    #[serde(default)]
    pub rationale: String,
}

/// The section structure chosen for the final article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedStructure {
    pub source_article: DraftId,
    #[serde(default)]
    pub structure_type: String,
    #[serde(default)]
    pub section_flow: Vec<String>,
    #[serde(default)]
    pub rationale: String,
}

/// One supporting point and the draft it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingPoint {
    pub point: String,
    pub source_article: DraftId,
}

/// The thesis and supporting points chosen for the final article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedArguments {
    pub primary_source: DraftId,
    pub core_thesis: String,
    #[serde(default)]
    pub supporting_points: Vec<SupportingPoint>,
    #[serde(default)]
    pub rationale: String,
}

/// A piece of evidence to carry over, and where it belongs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEvidence {
    pub evidence: String,
    pub source_article: DraftId,
    #[serde(default, rename = "where_to_use")]
    pub placement: String,
}

/// A phrase to reproduce verbatim, and where it belongs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedPhrase {
    pub phrase: String,
    pub source_article: DraftId,
    #[serde(default, rename = "suggested_placement")]
    pub placement: String,
}

/// How sure the selector is that the chosen elements combine well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// The cross-source recombination plan consumed by the synthesizer.
///
/// A blueprint is never mutated after selection. Feedback from failed
/// validation attempts travels separately in a [`SynthesisFeedback`] and is
/// merged into a rendered copy with [`Blueprint::with_feedback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub selected_headline: SelectedHeadline,
    pub selected_opening: SelectedOpening,
    pub selected_structure: SelectedStructure,
    pub selected_arguments: SelectedArguments,
    #[serde(default)]
    pub selected_evidence: Vec<SelectedEvidence>,
    #[serde(default)]
    pub phrases_to_preserve: Vec<PreservedPhrase>,
    #[serde(default)]
    pub elements_to_avoid: Vec<String>,
    #[serde(default)]
    pub synthesis_notes: String,
    pub confidence: Confidence,
}

impl Blueprint {
    /// Keys required inside the model's `synthesis_blueprint` object.
    pub const REQUIRED_FIELDS: &'static [&'static str] = &[
        "selected_headline",
        "selected_opening",
        "selected_structure",
        "selected_arguments",
    ];

    /// Returns a copy whose `synthesis_notes` carry the accumulated feedback.
    ///
    /// `self` is left untouched; with empty feedback the copy is identical.
    pub fn with_feedback(&self, feedback: &SynthesisFeedback) -> Blueprint {
        let mut rendered = self.clone();
        for entry in &feedback.entries {
            rendered.synthesis_notes.push_str("\n\n");
            rendered.synthesis_notes.push_str(entry);
        }
        rendered
    }

    /// Every distinct draft id the blueprint draws from.
    pub fn source_ids(&self) -> BTreeSet<DraftId> {
        let mut ids = BTreeSet::from([
            self.selected_headline.source_article,
            self.selected_opening.source_article,
            self.selected_structure.source_article,
            self.selected_arguments.primary_source,
        ]);
        ids.extend(
            self.selected_arguments
                .supporting_points
                .iter()
                .map(|p| p.source_article),
        );
        ids.extend(self.selected_evidence.iter().map(|e| e.source_article));
        ids.extend(self.phrases_to_preserve.iter().map(|p| p.source_article));
        ids
    }
}

/// Feedback accumulated across failed synthesis attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisFeedback {
    pub entries: Vec<String>,
}

impl SynthesisFeedback {
    /// Number of validation issues carried forward from one failed attempt.
    pub const ISSUES_PER_ATTEMPT: usize = 3;

    /// Records the first few issues of a failed validation.
    pub fn record_failure(&mut self, validation: &ValidationResult) {
        let issues: Vec<&str> = validation
            .issues
            .iter()
            .take(Self::ISSUES_PER_ATTEMPT)
            .map(String::as_str)
            .collect();
        self.entries.push(format!(
            "PREVIOUS ATTEMPT FAILED. Issues: {}",
            issues.join(", ")
        ));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Per-element blueprint compliance, as judged by the validator.
///
/// Booleans answer "was it used"; fractions answer "how much of it was used".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintCompliance {
    pub headline_used: bool,
    pub structure_followed: bool,
    pub core_argument_present: bool,
    pub supporting_points_included: f64,
    pub evidence_included: f64,
    pub phrases_preserved: f64,
    pub weaknesses_avoided: bool,
    pub compliance_score: f64,
}

/// The validator's rubric scores for the final article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    #[serde(flatten)]
    pub criteria: BTreeMap<String, f64>,
    #[serde(default)]
    pub overall: f64,
}

/// The validator's verdict on one synthesized article.
///
/// `passed` and `threshold_met` are the model's own judgment. `target_threshold`
/// is always the locally computed bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    #[serde(default)]
    pub blueprint_compliance: BlueprintCompliance,
    pub quality_scores: QualityScores,
    #[serde(default)]
    pub coherence_assessment: BTreeMap<String, bool>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    #[serde(default)]
    pub target_threshold: f64,
    #[serde(default)]
    pub threshold_met: bool,
}

impl ValidationResult {
    /// Keys the model must emit for a validation to be accepted.
    pub const REQUIRED_FIELDS: &'static [&'static str] =
        &["passed", "quality_scores", "issues", "threshold_met"];

    /// Whether the reported overall score actually reaches the threshold.
    ///
    /// Informational only; the pass/fail decision is [`Self::passed`].
    pub fn overall_clears_threshold(&self) -> bool {
        self.quality_scores.overall >= self.target_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> Blueprint {
        Blueprint {
            selected_headline: SelectedHeadline {
                source_article: DraftId::new(2),
                headline: "Maps Made by Everyone".into(),
                rationale: "specific and active".into(),
            },
            selected_opening: SelectedOpening {
                source_article: DraftId::new(1),
                approach: "open on a surveyor in the rain".into(),
                key_elements: vec!["surveyor".into()],
                rationale: String::new(),
            },
            selected_structure: SelectedStructure {
                source_article: DraftId::new(3),
                structure_type: "Problem-Solution-CTA".into(),
                section_flow: vec!["problem".into(), "solution".into(), "cta".into()],
                rationale: String::new(),
            },
            selected_arguments: SelectedArguments {
                primary_source: DraftId::new(1),
                core_thesis: "shared 3D data beats siloed data".into(),
                supporting_points: vec![SupportingPoint {
                    point: "cheaper capture".into(),
                    source_article: DraftId::new(4),
                }],
                rationale: String::new(),
            },
            selected_evidence: vec![],
            phrases_to_preserve: vec![PreservedPhrase {
                phrase: "the map is the territory, finally".into(),
                source_article: DraftId::new(5),
                placement: "closing".into(),
            }],
            elements_to_avoid: vec!["generic opening".into()],
            synthesis_notes: "keep it brisk".into(),
            confidence: Confidence {
                level: ConfidenceLevel::High,
                concerns: vec![],
            },
        }
    }

    #[test]
    fn draft_counts_words() {
        let draft = Draft::new(DraftId::new(1), "# Title\n\nThree more words");
        assert_eq!(draft.word_count, 5);
    }

    #[test]
    fn with_feedback_leaves_the_original_untouched() {
        let blueprint = sample_blueprint();
        let mut feedback = SynthesisFeedback::default();
        feedback.entries.push("PREVIOUS ATTEMPT FAILED. Issues: too long".into());

        let rendered = blueprint.with_feedback(&feedback);

        assert_eq!(blueprint.synthesis_notes, "keep it brisk");
        assert_eq!(
            rendered.synthesis_notes,
            "keep it brisk\n\nPREVIOUS ATTEMPT FAILED. Issues: too long"
        );
        assert_eq!(rendered.selected_headline, blueprint.selected_headline);
    }

    #[test]
    fn feedback_keeps_only_the_first_three_issues() {
        let validation = ValidationResult {
            passed: false,
            blueprint_compliance: BlueprintCompliance::default(),
            quality_scores: QualityScores::default(),
            coherence_assessment: BTreeMap::new(),
            issues: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            improvement_suggestions: vec![],
            target_threshold: 7.0,
            threshold_met: false,
        };
        let mut feedback = SynthesisFeedback::default();
        feedback.record_failure(&validation);
        assert_eq!(
            feedback.entries,
            vec!["PREVIOUS ATTEMPT FAILED. Issues: a, b, c".to_string()]
        );
    }

    #[test]
    fn source_ids_collects_every_contributor() {
        let ids: Vec<u64> = sample_blueprint()
            .source_ids()
            .into_iter()
            .map(DraftId::as_u64)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn confidence_level_accepts_capitalised_values() {
        let level: ConfidenceLevel = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(level, ConfidenceLevel::Medium);
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"medium\"");
    }

    #[test]
    fn quality_scores_flatten_criteria_beside_overall() {
        let scores: QualityScores =
            serde_json::from_str(r#"{"hook_strength": 8, "originality": 7, "overall": 7.6}"#)
                .unwrap();
        assert_eq!(scores.overall, 7.6);
        assert_eq!(scores.criteria.get("hook_strength"), Some(&8.0));
        assert_eq!(scores.criteria.len(), 2);
    }
}
