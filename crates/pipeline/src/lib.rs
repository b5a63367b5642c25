//! Core domain for the article synthesis pipeline.
//!
//! This crate contains every record the pipeline produces, the rubric and the
//! aggregation rules applied to votes, the cleanup and schema-checked decoding
//! of model output, run configuration, per-stage metrics, and the
//! [`LlmProvider`] port. Infrastructure crates implement the port; they never
//! add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`DraftId`, `CriterionName`, `PipelineRunId`) |
//! | [`types`] | Primitive values (`TokenCount`, `Timestamp`) and rounding |
//! | [`records`] | `Draft`, `Card`, `Score`, `Blueprint`, `ValidationResult` |
//! | [`rubric`] | The weighted rubric and per-vote overall score |
//! | [`scoring`] | Vote averaging and the validation threshold |
//! | [`sanitize`] | Reasoning-marker removal and code-fence unwrapping |
//! | [`decode`] | Schema-checked decoding of model JSON |
//! | [`metrics`] | Per-stage call accounting |
//! | [`config`] | Run configuration and its validation |
//! | [`ports`] | The `LlmProvider` trait |
//! | [`errors`] | Error and retry-policy types |

pub mod config;
pub mod decode;
pub mod errors;
pub mod identifiers;
pub mod metrics;
pub mod ports;
pub mod records;
pub mod rubric;
pub mod sanitize;
pub mod scoring;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{PipelineConfig, RetrySettings, StageSettings, StageTable};
pub use decode::{decode_blueprint, decode_card, decode_validation, decode_vote, parse_object};
pub use errors::{AggregationError, ConfigError, DecodeError, LlmError, RetryPolicy};
pub use identifiers::{CriterionName, DraftId, PipelineRunId};
pub use metrics::{CallRecord, PipelineMetrics, Stage, StageMetrics};
pub use ports::{CompletionRequest, CompletionResponse, LlmProvider};
pub use records::{
    Blueprint, BlueprintCompliance, Card, Confidence, ConfidenceLevel, CriterionScore, Draft,
    PreservedPhrase, QualityScores, Score, SelectedArguments, SelectedEvidence, SelectedHeadline,
    SelectedOpening, SelectedStructure, SupportingPoint, SynthesisFeedback, ValidationResult,
};
pub use rubric::{Criterion, Rubric};
pub use sanitize::{sanitize, strip_reasoning, unwrap_fenced};
pub use scoring::{average_votes, target_threshold, THRESHOLD_MARGIN};
pub use types::{round_to, word_count, Timestamp, TokenCount};
