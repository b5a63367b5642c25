//! Completion provider adapter for OpenAI-compatible chat endpoints.
//!
//! Implements [`pipeline::LlmProvider`] over HTTP. Any server exposing
//! `POST {api_base}/chat/completions` with the OpenAI request and response
//! shapes works (hosted APIs, local inference servers, proxies).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and `Retry-After` handling live here. Retrying itself does not: one call to
//! [`OpenAiCompatibleProvider::complete`] is exactly one HTTP request, and the
//! gateway in the `nodes` crate decides whether to try again.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, TokenCount};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest error body kept in [`LlmError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 2000;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub model: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

/// [`LlmProvider`] for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    headers: HeaderMap,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| LlmError::Http(format!("invalid API key header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            client,
            endpoint: chat_completions_url(&config.api_base),
            model: config.model,
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), ?retry_after, "completion endpoint returned an error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY_CHARS),
                retry_after,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        decode_chat_response(&text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

/// Decodes a successful chat completion body.
///
/// A missing first choice, or a first choice whose content is null or blank,
/// is [`LlmError::EmptyResponse`]. A body that is not a chat completion at
/// all is [`LlmError::Serialization`].
pub fn decode_chat_response(body: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Serialization(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    let usage = parsed.usage;
    Ok(CompletionResponse {
        content,
        prompt_tokens: usage
            .as_ref()
            .and_then(|u| u.prompt_tokens)
            .map(TokenCount::new),
        completion_tokens: usage
            .as_ref()
            .and_then(|u| u.completion_tokens)
            .map(TokenCount::new),
    })
}

/// Builds the chat completions URL from an API base.
pub fn chat_completions_url(api_base: &str) -> String {
    let base = api_base.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

/// Parses a `Retry-After` value given in whole seconds.
///
/// HTTP-date values are ignored; the caller then falls back to its fixed delay.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pipeline::RetryPolicy;

    use super::*;

    #[test]
    fn decodes_content_and_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
        }"#;

        let response = decode_chat_response(body).unwrap();

        assert_eq!(response.content, "Hello there");
        assert_eq!(response.prompt_tokens, Some(TokenCount::new(12)));
        assert_eq!(response.completion_tokens, Some(TokenCount::new(2)));
    }

    #[test]
    fn usage_is_optional() {
        let body = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let response = decode_chat_response(body).unwrap();
        assert_eq!(response.prompt_tokens, None);
    }

    #[test]
    fn null_or_missing_content_is_empty_response() {
        for body in [
            r#"{"choices": [{"message": {"content": null}}]}"#,
            r#"{"choices": [{"message": {"content": "   "}}]}"#,
            r#"{"choices": [{"message": {"role": "assistant"}}]}"#,
            r#"{"choices": []}"#,
        ] {
            assert_eq!(decode_chat_response(body), Err(LlmError::EmptyResponse), "{body}");
        }
    }

    #[test]
    fn non_completion_body_is_not_retryable() {
        let err = decode_chat_response("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, LlmError::Serialization(_)));
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn endpoint_is_derived_from_the_base() {
        assert_eq!(
            chat_completions_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn request_body_uses_chat_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            temperature: 0.3,
            max_tokens: 4000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 4000);
    }

    #[test]
    fn provider_builds_with_and_without_key() {
        let config = OpenAiConfig {
            api_base: "http://localhost:1234/v1".into(),
            model: "local-model".into(),
            api_key: None,
            timeout: Duration::from_secs(5),
        };
        let provider = OpenAiCompatibleProvider::new(config.clone()).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(provider.model(), "local-model");

        let keyed = OpenAiCompatibleProvider::new(OpenAiConfig {
            api_key: Some("sk-test".into()),
            ..config
        })
        .unwrap();
        assert!(keyed.headers.contains_key(AUTHORIZATION));
    }
}
