//! Stage implementations, the completion gateway, and the pipeline executor.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence completion calls and hand the
//! responses to the decoding and aggregation rules in the [`pipeline`] crate.
//! They contain no domain rules of their own. All calls go through the
//! [`LlmGateway`], which owns the retry loop; the provider behind it is any
//! [`pipeline::LlmProvider`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gateway`] | `LlmGateway`: bounded fixed-delay retries around one provider |
//! | [`prompts`] | Built-in prompt templates and brace-safe rendering |
//! | [`context`] | `NodeContext`: gateway, prompts, rubric and config shared by stages |
//! | [`draft`] | Candidate generation |
//! | [`extract`] | Card extraction with decode retries |
//! | [`score`] | Rubric voting and vote averaging |
//! | [`select`] | Blueprint selection |
//! | [`synthesize`] | Article rendering |
//! | [`validate`] | Article validation |
//! | [`executor`] | `PipelineExecutor` and the synthesize/validate loop |
//! | `testing` | Scripted provider and canned responses (`testing` feature) |

pub mod context;
pub mod draft;
pub mod errors;
pub mod executor;
pub mod extract;
pub mod gateway;
pub mod prompts;
pub mod score;
pub mod select;
pub mod synthesize;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validate;

pub use context::NodeContext;
pub use draft::generate_drafts;
pub use errors::{CompletionError, NodeError};
pub use executor::{PipelineExecutor, PipelineOutcome, SynthesisOutcome};
pub use extract::{extract_all_cards, extract_card};
pub use gateway::{Completion, FailedCompletion, LlmGateway};
pub use prompts::{render_template, Prompt, PromptLibrary};
pub use score::{score_all_cards_with_voting, score_card};
pub use select::select_best_elements;
pub use synthesize::synthesize;
pub use validate::validate;
