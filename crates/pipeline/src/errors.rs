//! Error and retry-policy types for the synthesis pipeline domain.
//!
//! [`LlmError`] is what an [`crate::LlmProvider`] reports for a single failed
//! completion attempt. Every variant maps to a [`RetryPolicy`] so the
//! completion gateway can decide whether to try again without knowing anything
//! about the transport.
//!
//! [`DecodeError`], [`AggregationError`] and [`ConfigError`] cover the pure
//! domain operations: turning model output into typed records, folding votes,
//! and validating run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by [`LlmError::retry_policy`] to let the gateway decide whether to
/// re-issue a completion request or give up immediately.
///
/// ## Rules
///
/// - `Retryable` errors: transport failures, timeouts, rate limiting, 5xx
///   responses, and responses carrying no content.
/// - `NonRetryable` errors: authentication and other 4xx rejections, bodies
///   that are not a completion response at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum delay before the next attempt, when the service supplied one
        /// (e.g. a `Retry-After` header). `None` means use the configured
        /// fixed delay.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// A single failed completion attempt, as reported by an [`crate::LlmProvider`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    /// The request could not be sent or the response could not be read.
    #[error("http error: {0}")]
    Http(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
        /// Delay requested by the service, if any.
        retry_after: Option<Duration>,
    },

    /// The service answered successfully but the completion had no content.
    #[error("empty response from completion service")]
    EmptyResponse,

    /// The response body was not a completion response.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LlmError {
    /// Classifies this error for the gateway's retry loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Http(_) | Self::EmptyResponse => RetryPolicy::Retryable { after: None },
            Self::Status {
                status,
                retry_after,
                ..
            } => {
                if *status == 408 || *status == 429 || *status >= 500 {
                    RetryPolicy::Retryable {
                        after: *retry_after,
                    }
                } else {
                    RetryPolicy::NonRetryable
                }
            }
            Self::Serialization(_) => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Why a model response could not be turned into a typed record.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeError {
    /// The text is not a JSON object, or a field has the wrong shape.
    #[error("response is not valid JSON for this record: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },

    /// The JSON object is missing required keys.
    #[error("response is missing required fields: {}", missing.join(", "))]
    Schema {
        /// Names of the absent keys, in schema order.
        missing: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Errors produced while folding per-unit results into an aggregate.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AggregationError {
    /// Vote averaging was asked to average nothing.
    #[error("no votes to average")]
    NoVotes,

    /// A threshold or selection was requested over an empty score set.
    #[error("no scores available")]
    NoScores,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The run configuration or rubric is invalid.
///
/// Produced at load time; a pipeline never starts with an invalid config.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A count that must be positive is zero.
    #[error("{field} must be greater than 0")]
    ZeroCount {
        /// Dotted path of the offending setting.
        field: &'static str,
    },

    /// A temperature is negative or not finite.
    #[error("{field} must be a finite, non-negative temperature (got {value})")]
    InvalidTemperature {
        /// Dotted path of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Rubric weights do not sum to 1.
    #[error("rubric weights sum to {sum}, expected 1.0")]
    WeightSum {
        /// Actual sum of all weights.
        sum: f64,
    },

    /// A rubric criterion is malformed.
    #[error("invalid rubric criterion '{name}': {reason}")]
    InvalidCriterion {
        /// The criterion name as given.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_empty_responses_are_retryable() {
        assert_eq!(
            LlmError::Http("connection reset".into()).retry_policy(),
            RetryPolicy::Retryable { after: None }
        );
        assert_eq!(
            LlmError::EmptyResponse.retry_policy(),
            RetryPolicy::Retryable { after: None }
        );
    }

    #[test]
    fn status_codes_split_on_transience() {
        let limited = LlmError::Status {
            status: 429,
            body: "slow down".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            limited.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }
        );

        let unavailable = LlmError::Status {
            status: 503,
            body: String::new(),
            retry_after: None,
        };
        assert!(matches!(
            unavailable.retry_policy(),
            RetryPolicy::Retryable { .. }
        ));

        let unauthorized = LlmError::Status {
            status: 401,
            body: "bad key".into(),
            retry_after: None,
        };
        assert_eq!(unauthorized.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn schema_error_lists_missing_fields() {
        let err = DecodeError::Schema {
            missing: vec!["tone".into(), "weaknesses".into()],
        };
        assert_eq!(
            err.to_string(),
            "response is missing required fields: tone, weaknesses"
        );
    }
}
