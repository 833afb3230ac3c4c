//! Text-generation provider abstraction.
//!
//! Provides a unified async trait for sending a single prompt to a
//! generative model, a Gemini implementation with transient-failure retry,
//! and a mock provider for testing.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::retry::{with_retry, RetryConfig};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when calling a text-generation provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// The API key was rejected. Terminal: the user must fix the key.
    #[error("invalid credential: {message}")]
    InvalidCredential { message: String },

    /// HTTP 429. Retried internally; surfaced once retries are exhausted.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// HTTP 5xx. Retried internally; surfaced once retries are exhausted.
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    /// A single attempt exceeded the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The reply did not have the expected shape. Never retried.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Any other failure: non-retryable HTTP status or transport error.
    #[error("request failed: {message}")]
    RequestFailed { status: Option<u16>, message: String },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::ServerError { .. } | LlmError::Timeout
        )
    }

    /// Errors that no later stage of a run can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LlmError::InvalidCredential { .. } | LlmError::Cancelled)
    }

    /// Actionable text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::InvalidCredential { .. } => {
                "Invalid API key - please check your Gemini API key".to_string()
            }
            LlmError::RateLimited { .. } => {
                "Rate limit exceeded - please try again later".to_string()
            }
            LlmError::ServerError { .. } => {
                "Gemini API server error - please try again later".to_string()
            }
            LlmError::Timeout => {
                "Request timed out - the model service did not respond in time".to_string()
            }
            LlmError::MalformedResponse(_) => {
                "Unexpected response format from the model service".to_string()
            }
            LlmError::RequestFailed {
                status: Some(status),
                message,
            } => format!("API request failed: {status} {message}"),
            LlmError::RequestFailed {
                status: None,
                message,
            } => format!("Network error: {message}"),
            LlmError::Cancelled => "Operation cancelled".to_string(),
        }
    }

    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = summarize_body(body);
        match status {
            401 | 403 => LlmError::InvalidCredential { message },
            // Gemini reports a bad key as 400 INVALID_ARGUMENT.
            400 if body.contains("API key not valid") => LlmError::InvalidCredential { message },
            429 => LlmError::RateLimited { message },
            500..=599 => LlmError::ServerError { status, message },
            _ => LlmError::RequestFailed {
                status: Some(status),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::RequestFailed {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// Prefer the `error.message` field of a JSON error body, else the raw text.
fn summarize_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(300).collect())
}

// ---------------------------------------------------------------------------
// Core data types
// ---------------------------------------------------------------------------

/// An API key supplied by the caller for a single request.
///
/// The key is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Response from a text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub finish_reason: String,
}

// ---------------------------------------------------------------------------
// LlmProvider trait
// ---------------------------------------------------------------------------

/// Async trait for text-generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` as a single user turn and return the generated text.
    async fn complete(&self, prompt: &str, api_key: &ApiKey) -> Result<LlmResponse, LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiProvider
// ---------------------------------------------------------------------------

/// Provider for the Gemini `generateContent` endpoint.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl GeminiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    /// Create a provider with the default endpoint, model, 30s per-attempt
    /// timeout and retry policy.
    pub fn new() -> Result<Self, LlmError> {
        Self::from_config(&sc_core::config::ProviderConfig::default())
    }

    pub fn from_config(config: &sc_core::config::ProviderConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LlmError::RequestFailed {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: RetryConfig::from_provider_config(config),
        })
    }

    /// Override the base URL (useful for testing with a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Build the JSON request body for a single user prompt.
    pub fn build_request_body(prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }],
                }
            ]
        })
    }

    /// Pull `candidates[0].content.parts[0].text` out of a reply body.
    pub fn parse_response_body(body: &str, model: &str) -> Result<LlmResponse, LlmError> {
        let reply: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| LlmError::MalformedResponse(format!("invalid JSON: {e}")))?;

        let candidate = reply
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("no candidates in response".into()))?;
        let text = candidate
            .content
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| {
                LlmError::MalformedResponse("candidate has no text part".into())
            })?;

        let usage = reply.usage_metadata.unwrap_or_default();
        Ok(LlmResponse {
            content: text,
            model: reply.model_version.unwrap_or_else(|| model.to_string()),
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            finish_reason: candidate.finish_reason.unwrap_or_else(|| "unknown".into()),
        })
    }

    async fn send_once(&self, prompt: &str, api_key: &ApiKey) -> Result<LlmResponse, LlmError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose())
            .header("content-type", "application/json")
            .json(&Self::build_request_body(prompt))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            return Err(LlmError::from_status(status, &text));
        }

        Self::parse_response_body(&text, &self.model)
    }
}

/// Deserialize helpers for the Gemini response.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, api_key: &ApiKey) -> Result<LlmResponse, LlmError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "sending generateContent request");
        let response = with_retry(&self.retry, "generate_content", || {
            self.send_once(prompt, api_key)
        })
        .await?;
        debug!(
            model = %response.model,
            output_tokens = response.output_tokens,
            "generateContent response received"
        );
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

type MockHandler = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// A mock provider for testing.
///
/// Each call to `complete` pops the next queued reply. When the queue is
/// empty the handler (if any) is consulted, otherwise a default reply is
/// returned.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    handler: Option<Box<MockHandler>>,
    /// Captured prompts for test assertions.
    captured_prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a mock provider with no pre-configured responses (returns defaults).
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            captured_prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(text.into()));
        self
    }

    /// Queue an error.
    pub fn with_error(self, error: LlmError) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
        self
    }

    /// Answer prompts with `handler` once the queue is drained.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Get captured prompts for assertions.
    pub fn captured_prompts(&self) -> Vec<String> {
        self.captured_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, prompt: &str, _api_key: &ApiKey) -> Result<LlmResponse, LlmError> {
        self.captured_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let queued = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let content = match (queued, &self.handler) {
            (Some(result), _) => result?,
            (None, Some(handler)) => handler(prompt)?,
            (None, None) => "Mock response".to_string(),
        };

        Ok(LlmResponse {
            content,
            model: "mock".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            finish_reason: "STOP".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Request body tests -------------------------------------------------

    #[test]
    fn test_request_body_shape() {
        let body = GeminiProvider::build_request_body("hello");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_endpoint_includes_model() {
        let provider = GeminiProvider::new()
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    // -- Response parsing tests ---------------------------------------------

    #[test]
    fn test_parse_valid_response() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "generated"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3},
            "modelVersion": "gemini-2.0-flash-001"
        }"#;
        let resp = GeminiProvider::parse_response_body(body, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.content, "generated");
        assert_eq!(resp.model, "gemini-2.0-flash-001");
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
        assert_eq!(resp.finish_reason, "STOP");
    }

    #[test]
    fn test_parse_without_usage_defaults() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"x"}]}}]}"#;
        let resp = GeminiProvider::parse_response_body(body, "m").unwrap();
        assert_eq!(resp.model, "m");
        assert_eq!(resp.input_tokens, 0);
        assert_eq!(resp.finish_reason, "unknown");
    }

    #[test]
    fn test_parse_missing_candidates_is_malformed() {
        let err = GeminiProvider::parse_response_body(r#"{"candidates":[]}"#, "m").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));

        let err = GeminiProvider::parse_response_body(
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            "m",
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));

        let err = GeminiProvider::parse_response_body("not json", "m").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    // -- Error classification tests -----------------------------------------

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            LlmError::from_status(401, ""),
            LlmError::InvalidCredential { .. }
        ));
        assert!(matches!(
            LlmError::from_status(429, ""),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            LlmError::from_status(503, ""),
            LlmError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            LlmError::from_status(404, "nope"),
            LlmError::RequestFailed {
                status: Some(404),
                ..
            }
        ));
    }

    #[test]
    fn test_gemini_bad_key_400_is_invalid_credential() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        match LlmError::from_status(400, body) {
            LlmError::InvalidCredential { message } => {
                assert!(message.starts_with("API key not valid"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::from_status(500, "").is_retryable());
        assert!(LlmError::from_status(429, "").is_retryable());
        assert!(!LlmError::from_status(401, "").is_retryable());
        assert!(!LlmError::from_status(400, "").is_retryable());
        assert!(!LlmError::MalformedResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let messages = [
            LlmError::from_status(401, "").user_message(),
            LlmError::from_status(429, "").user_message(),
            LlmError::from_status(500, "").user_message(),
            LlmError::Timeout.user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("Invalid API key"));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret");
        assert!(!format!("{key:?}").contains("super-secret"));
        assert!(ApiKey::new("  ").is_blank());
    }

    // -- MockProvider tests -------------------------------------------------

    #[tokio::test]
    async fn test_mock_queue_then_handler_then_default() {
        let mock = MockProvider::new()
            .with_response("first")
            .with_error(LlmError::Timeout);
        let key = ApiKey::new("k");

        assert_eq!(mock.complete("a", &key).await.unwrap().content, "first");
        assert_eq!(mock.complete("b", &key).await.unwrap_err(), LlmError::Timeout);
        assert_eq!(mock.complete("c", &key).await.unwrap().content, "Mock response");
        assert_eq!(mock.captured_prompts(), vec!["a", "b", "c"]);

        let mock = MockProvider::new().with_handler(|p| Ok(format!("echo: {p}")));
        assert_eq!(mock.complete("hi", &key).await.unwrap().content, "echo: hi");
        assert_eq!(mock.call_count(), 1);
    }
}
