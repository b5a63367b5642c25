//! Errors raised by the stages and the completion gateway.

use pipeline::{AggregationError, DecodeError, DraftId, LlmError};
use thiserror::Error;

/// A completion call that did not produce text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    /// Every attempt failed with a retryable error.
    #[error("completion failed after {attempts} attempt(s); last error: {last}")]
    ExhaustedRetries { attempts: u32, last: LlmError },

    /// The provider failed in a way retrying cannot fix.
    #[error("completion rejected: {0}")]
    Rejected(LlmError),
}

/// A stage failure that aborts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// No attempt produced a decodable card.
    #[error("could not extract a card for draft {draft_id} after {attempts} attempt(s): {last}")]
    ExtractionFailed {
        draft_id: DraftId,
        attempts: u32,
        last: DecodeError,
    },

    /// One scoring vote could not be decoded.
    #[error("vote for draft {draft_id} unreadable: {source}")]
    VoteUnreadable {
        draft_id: DraftId,
        source: DecodeError,
    },

    /// The selector's response was not a usable blueprint.
    #[error("selection failed: {0}")]
    SelectionFailed(DecodeError),

    /// The validator's response could not be decoded.
    #[error("validation response unreadable: {0}")]
    ValidationUnreadable(DecodeError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    /// Every draft was dropped during extraction.
    #[error("no cards survived extraction")]
    NoCards,
}
