//! The completion gateway: one place every stage goes through to reach the
//! model.
//!
//! The gateway owns the bounded fixed-delay retry loop. It does not record
//! metrics itself; it hands back a [`CallRecord`] alongside the text and the
//! calling stage folds that into the run's [`pipeline::PipelineMetrics`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline::{
    word_count, CallRecord, CompletionRequest, LlmError, LlmProvider, RetryPolicy, RetrySettings,
    StageSettings,
};
use tracing::{debug, warn};

use crate::CompletionError;

/// Characters of prompt or output shown in DEBUG previews.
pub const LOG_PREVIEW_CHARS: usize = 400;

/// Text returned by a successful call plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub record: CallRecord,
}

/// A call that ended without text, plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCompletion {
    pub error: CompletionError,
    pub record: CallRecord,
}

/// Retries completion calls against one provider.
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    retry: RetrySettings,
}

impl std::fmt::Debug for LlmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGateway")
            .field("model", &self.provider.model())
            .field("retry", &self.retry)
            .finish()
    }
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetrySettings) -> Self {
        Self { provider, retry }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Sends `system` and `user` with the stage's sampling settings.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        settings: StageSettings,
    ) -> Result<Completion, FailedCompletion> {
        let request = CompletionRequest {
            system: system.to_string(),
            user: user.to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };
        self.send(&request).await
    }

    /// Sends `request`, retrying retryable failures up to the configured
    /// number of attempts with a fixed pause between them.
    ///
    /// A service-supplied retry delay replaces the fixed pause for that
    /// attempt, capped at `retry.max_server_delay`. There is no pause after
    /// the final attempt.
    pub async fn send(&self, request: &CompletionRequest) -> Result<Completion, FailedCompletion> {
        let attempts = self.retry.attempts.max(1);
        let words_in = word_count(&request.system) + word_count(&request.user);

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                model = %self.provider.model(),
                temperature = request.temperature,
                max_tokens = request.max_tokens,
                user_preview = %truncate_for_log(&request.user, LOG_PREVIEW_CHARS),
                "sending completion request"
            );
        }

        let started = Instant::now();
        let failed = |error: CompletionError, attempts: u32| FailedCompletion {
            error,
            record: CallRecord {
                words_in,
                latency: started.elapsed(),
                attempts,
                failed: true,
                ..CallRecord::default()
            },
        };
        let mut last_error = LlmError::EmptyResponse;

        for attempt in 1..=attempts {
            let error = match self.provider.complete(request).await {
                Ok(response) if response.content.trim().is_empty() => LlmError::EmptyResponse,
                Ok(response) => {
                    let latency = started.elapsed();
                    let record = CallRecord {
                        words_in,
                        words_out: word_count(&response.content),
                        prompt_tokens: response.prompt_tokens.unwrap_or_default(),
                        completion_tokens: response.completion_tokens.unwrap_or_default(),
                        latency,
                        attempts: attempt,
                        failed: false,
                    };
                    if tracing::enabled!(tracing::Level::DEBUG) {
                        debug!(
                            attempt,
                            latency_ms = latency.as_millis() as u64,
                            words_out = record.words_out,
                            output_preview = %truncate_for_log(&response.content, LOG_PREVIEW_CHARS),
                            "completion received"
                        );
                    }
                    return Ok(Completion {
                        text: response.content,
                        record,
                    });
                }
                Err(error) => error,
            };

            let pause = match error.retry_policy() {
                RetryPolicy::NonRetryable => {
                    warn!(attempt, error = %error, "completion rejected, not retrying");
                    return Err(failed(CompletionError::Rejected(error), attempt));
                }
                RetryPolicy::Retryable { after } => self.pause_for(after),
            };

            if attempt < attempts {
                warn!(
                    attempt,
                    max_attempts = attempts,
                    retry_in_ms = pause.as_millis() as u64,
                    error = %error,
                    "completion attempt failed, retrying"
                );
                sleep(pause).await;
            } else {
                warn!(attempt, error = %error, "completion attempt failed, giving up");
            }
            last_error = error;
        }

        Err(failed(
            CompletionError::ExhaustedRetries {
                attempts,
                last: last_error,
            },
            attempts,
        ))
    }

    /// The pause before the next attempt: the service's delay when it gave
    /// one, capped, otherwise the fixed delay.
    fn pause_for(&self, server_delay: Option<Duration>) -> Duration {
        match server_delay {
            Some(after) => after.min(self.retry.max_server_delay),
            None => self.retry.delay,
        }
    }
}

async fn sleep(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

/// Shortens `input` to `max_chars` characters for log output.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}
