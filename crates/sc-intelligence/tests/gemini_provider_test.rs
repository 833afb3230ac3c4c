use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use sc_intelligence::{ApiKey, GeminiProvider, LlmError, LlmProvider, RetryConfig};
use serde_json::Value;

// ===========================================================================
// Scripted test server
// ===========================================================================

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct ScriptState {
    replies: Arc<Mutex<VecDeque<(u16, String)>>>,
    captured: Arc<Mutex<Vec<Captured>>>,
}

async fn scripted_reply(
    State(state): State<ScriptState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    state.captured.lock().unwrap().push(Captured {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });

    let (status, body) = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, "script exhausted".to_string()));
    (StatusCode::from_u16(status).unwrap(), body)
}

/// Spin up a server that answers each request with the next scripted
/// `(status, body)` pair, return the base URL and the shared state.
async fn start_scripted_server(replies: Vec<(u16, String)>) -> (String, ScriptState) {
    let state = ScriptState {
        replies: Arc::new(Mutex::new(replies.into())),
        ..Default::default()
    };
    let router = Router::new()
        .fallback(scripted_reply)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn ok_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2 }
    })
    .to_string()
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
        multiplier: 2,
    }
}

fn provider_for(base: &str) -> GeminiProvider {
    GeminiProvider::new()
        .expect("build provider")
        .with_base_url(base)
        .with_retry(fast_retry())
}

// ===========================================================================
// Happy path
// ===========================================================================

#[tokio::test]
async fn test_request_shape_and_reply_extraction() {
    let (base, state) = start_scripted_server(vec![(200, ok_body("hello back"))]).await;
    let provider = provider_for(&base);

    let resp = provider
        .complete("say hello", &ApiKey::new("test-key"))
        .await
        .unwrap();
    assert_eq!(resp.content, "hello back");
    assert_eq!(resp.input_tokens, 4);
    assert_eq!(resp.output_tokens, 2);

    let captured = state.captured.lock().unwrap().clone();
    assert_eq!(captured.len(), 1);
    assert_eq!(
        captured[0].path,
        "/v1beta/models/gemini-2.0-flash:generateContent"
    );
    assert_eq!(captured[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(captured[0].body["contents"][0]["role"], "user");
    assert_eq!(
        captured[0].body["contents"][0]["parts"][0]["text"],
        "say hello"
    );
}

// ===========================================================================
// Retry policy
// ===========================================================================

#[tokio::test]
async fn test_two_server_errors_then_success() {
    let (base, state) = start_scripted_server(vec![
        (500, "boom".into()),
        (500, "boom again".into()),
        (200, ok_body("finally")),
    ])
    .await;
    let provider = provider_for(&base);

    let started = std::time::Instant::now();
    let resp = provider.complete("p", &ApiKey::new("k")).await.unwrap();
    assert_eq!(resp.content, "finally");
    // One initial attempt plus exactly two retries.
    assert_eq!(state.captured.lock().unwrap().len(), 3);
    // Backoff of 10ms then 20ms.
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let (base, state) = start_scripted_server(vec![
        (401, r#"{"error":{"message":"bad key"}}"#.into()),
        (200, ok_body("should never be reached")),
    ])
    .await;
    let provider = provider_for(&base);

    let err = provider.complete("p", &ApiKey::new("k")).await.unwrap_err();
    assert_eq!(
        err,
        LlmError::InvalidCredential {
            message: "bad key".into()
        }
    );
    assert_eq!(state.captured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let (base, state) = start_scripted_server(vec![
        (429, "slow down".into()),
        (429, "slow down".into()),
        (429, "slow down".into()),
        (200, ok_body("too late")),
    ])
    .await;
    let provider = provider_for(&base);

    let err = provider.complete("p", &ApiKey::new("k")).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { .. }));
    assert_eq!(state.captured.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (base, state) = start_scripted_server(vec![(404, "no such model".into())]).await;
    let provider = provider_for(&base);

    let err = provider.complete("p", &ApiKey::new("k")).await.unwrap_err();
    assert!(matches!(
        err,
        LlmError::RequestFailed {
            status: Some(404),
            ..
        }
    ));
    assert_eq!(state.captured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_reply_is_not_retried() {
    let (base, state) = start_scripted_server(vec![
        (200, r#"{"candidates":[]}"#.into()),
        (200, ok_body("unused")),
    ])
    .await;
    let provider = provider_for(&base);

    let err = provider.complete("p", &ApiKey::new("k")).await.unwrap_err();
    assert!(matches!(err, LlmError::MalformedResponse(_)));
    assert_eq!(state.captured.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_host_is_request_failed() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = provider_for(&format!("http://{addr}"));
    let err = provider.complete("p", &ApiKey::new("k")).await.unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed { status: None, .. }));
    assert!(err.user_message().starts_with("Network error"));
}
