use std::sync::Arc;

use sc_agents::{CodeAssistant, PipelineError, ReviewError};
use sc_core::config::Config;
use sc_core::types::PlanStep;
use sc_harness::ToolRegistry;
use sc_intelligence::{ApiKey, LlmError, MockProvider};
use tokio_util::sync::CancellationToken;

const CLEAN_REPLY: &str = "ISSUES:\n- No issues detected\n\nRECOMMENDATIONS:\n- No recommendations needed\n\nSTEPS:\n- No action required";

fn assistant(provider: Arc<MockProvider>) -> CodeAssistant {
    CodeAssistant::new(provider, ToolRegistry::new(), &Config::default())
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancelled_run_does_not_poison_next_request() {
    let token = CancellationToken::new();
    let in_flight = token.clone();
    let provider = Arc::new(MockProvider::new().with_handler(move |_| {
        in_flight.cancel();
        Ok(CLEAN_REPLY.to_string())
    }));
    let assistant = assistant(provider).with_cancellation(token.clone());

    let err = assistant
        .run_code_review("fn a() {}", "a.rs", &ApiKey::new("key"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Llm(LlmError::Cancelled)));
    assert!(token.is_cancelled());

    let results = assistant
        .run_code_review("fn b() {}", "b.rs", &ApiKey::new("key"))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| !r.is_failed()));
}

#[tokio::test]
async fn test_cancelling_before_a_run_only_affects_that_token() {
    let provider = Arc::new(MockProvider::new().with_handler(|_| Ok(CLEAN_REPLY.to_string())));
    let assistant = assistant(provider.clone());

    let stale = assistant.cancellation_token();
    stale.cancel();

    let results = assistant
        .run_code_review("fn b() {}", "b.rs", &ApiKey::new("key"))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(provider.call_count(), 4);
    assert!(!assistant.cancellation_token().is_cancelled());
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_credential_skips_the_pipeline() {
    let provider = Arc::new(MockProvider::new());
    let assistant = assistant(provider.clone());

    let err = assistant
        .run_pipeline("fn a() {}", "explain", "a.rs", &ApiKey::new("  "), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingPrerequisite(ref what) if what == "API key"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_blank_credential_skips_implementation() {
    let provider = Arc::new(MockProvider::new());
    let assistant = assistant(provider.clone());

    let err = assistant
        .generate_implementation(
            "fn a() {}",
            "add logging",
            "a.rs",
            &[PlanStep::new(1, "Add a log line")],
            &ApiKey::new(""),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingPrerequisite(ref what) if what == "API key"));
    assert_eq!(provider.call_count(), 0);
}
