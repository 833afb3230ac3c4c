use std::sync::Arc;

use sc_agents::prompts::TRUNCATION_NOTICE;
use sc_agents::{CodeReviewAgent, ReviewError};
use sc_core::config::ReviewConfig;
use sc_core::types::{CodeReviewResult, ReviewAspect, ReviewOutcome};
use sc_intelligence::{ApiKey, LlmError, MockProvider};
use tokio_util::sync::CancellationToken;

const CLEAN_REPLY: &str = "ISSUES:\n- No issues detected\n\nRECOMMENDATIONS:\n- No recommendations needed\n\nSTEPS:\n- No action required";

fn security_fails() -> MockProvider {
    MockProvider::new().with_handler(|prompt| {
        if prompt.starts_with("You are a security expert.") {
            Err(LlmError::ServerError {
                status: 500,
                message: "internal".into(),
            })
        } else {
            Ok(CLEAN_REPLY.to_string())
        }
    })
}

fn config(parallel: bool) -> ReviewConfig {
    ReviewConfig {
        parallel,
        ..Default::default()
    }
}

async fn assert_only_security_failed(parallel: bool) {
    let agent = CodeReviewAgent::new(Arc::new(security_fails()), config(parallel));

    let results = agent
        .review(
            "function f() { return 1; }",
            "f.js",
            &ApiKey::new("key"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let aspects: Vec<ReviewAspect> = results.iter().map(|r| r.aspect).collect();
    assert_eq!(aspects, ReviewAspect::ALL.to_vec());

    let security = &results[2];
    assert!(security.is_failed());
    assert!(security.has_issues);
    assert_eq!(
        security.issues,
        vec!["API call failed: Gemini API server error - please try again later"]
    );
    assert_eq!(security.recommendations, vec!["Check API key and network connection"]);
    assert_eq!(
        security.steps,
        vec!["Verify API key", "Check internet connection", "Retry analysis"]
    );

    for (index, result) in results.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert_eq!(
            *result,
            CodeReviewResult::clean(ReviewAspect::ALL[index]),
            "aspect {} should be clean",
            result.aspect
        );
    }
}

#[tokio::test]
async fn test_security_failure_is_isolated_sequential() {
    assert_only_security_failed(false).await;
}

#[tokio::test]
async fn test_security_failure_is_isolated_parallel() {
    assert_only_security_failed(true).await;
}

#[tokio::test]
async fn test_rejects_empty_code_and_blank_key_without_calls() {
    let provider = Arc::new(MockProvider::new());
    let agent = CodeReviewAgent::new(provider.clone(), config(false));
    let cancel = CancellationToken::new();

    let err = agent
        .review("   \n", "f.js", &ApiKey::new("key"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::EmptyCode));

    let err = agent
        .review("let x = 1;", "f.js", &ApiKey::new(" "), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::MissingCredential));

    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_long_code_is_truncated_in_every_prompt() {
    let provider = Arc::new(MockProvider::new().with_handler(|_| Ok(CLEAN_REPLY.to_string())));
    let agent = CodeReviewAgent::new(provider.clone(), config(false));
    let code = format!("{}TAIL_MARKER", "x".repeat(10_000));

    agent
        .review(&code, "big.js", &ApiKey::new("key"), &CancellationToken::new())
        .await
        .unwrap();

    let prompts = provider.captured_prompts();
    assert_eq!(prompts.len(), 4);
    for prompt in prompts {
        assert!(prompt.contains(TRUNCATION_NOTICE));
        assert!(!prompt.contains("TAIL_MARKER"));
    }
}

#[tokio::test]
async fn test_unstructured_reply_is_unparsed_not_clean() {
    let provider = Arc::new(
        MockProvider::new().with_handler(|_| Ok("This code is mostly fine.".to_string())),
    );
    let agent = CodeReviewAgent::new(provider, config(false));

    let results = agent
        .review("let x = 1;", "a.js", &ApiKey::new("key"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(results
        .iter()
        .all(|r| matches!(r.outcome, ReviewOutcome::Unparsed { .. }) && !r.has_issues));
}

#[tokio::test]
async fn test_cancelled_review_is_an_error() {
    let agent = CodeReviewAgent::new(Arc::new(MockProvider::new()), config(true));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = agent
        .review("let x = 1;", "a.js", &ApiKey::new("key"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Llm(LlmError::Cancelled)));
}

#[tokio::test]
async fn test_implement_fix_fills_generated_code() {
    let reply = "PLAN_START\n1. Escape input\nPLAN_END\nEXPLANATION_START\nEscapes HTML.\nEXPLANATION_END\nNEW_CODE_START\n```js\nel.textContent = input;\n```\nNEW_CODE_END";
    let provider = Arc::new(MockProvider::new().with_response(reply));
    let agent = CodeReviewAgent::new(provider.clone(), config(false));
    let finding = CodeReviewResult::issues_found(
        ReviewAspect::Security,
        vec!["innerHTML with user input".into()],
        vec!["Use textContent".into()],
        vec!["Replace the assignment".into()],
    );

    let fixed = agent
        .implement_fix(
            "el.innerHTML = input;",
            "view.js",
            &finding,
            &ApiKey::new("key"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(fixed.generated_code.as_deref(), Some("el.textContent = input;"));
    assert_eq!(fixed.issues, finding.issues);
    let prompt = &provider.captured_prompts()[0];
    assert!(prompt.contains("ISSUES:\n- innerHTML with user input"));
    assert!(prompt.contains("A security review"));
}

#[tokio::test]
async fn test_implement_fix_without_code_section() {
    let provider = Arc::new(MockProvider::new().with_response("I cannot help with that."));
    let agent = CodeReviewAgent::new(provider, config(false));

    let err = agent
        .implement_fix(
            "x = 1",
            "a.py",
            &CodeReviewResult::clean(ReviewAspect::Clarity),
            &ApiKey::new("key"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NoCodeGenerated));
}
