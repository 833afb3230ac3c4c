//! Four-aspect code review: bugs, performance, security, clarity.

use std::borrow::Cow;
use std::sync::Arc;

use futures_util::future::join_all;
use sc_core::config::ReviewConfig;
use sc_core::parsing::{parse_generation_response, strip_code_fence, ReviewSections};
use sc_core::types::{CodeReviewResult, ReviewAspect};
use sc_intelligence::{ApiKey, LlmError, LlmProvider};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::prompts::{self, TRUNCATION_NOTICE};
use crate::stages::ask;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("no code content provided for review")]
    EmptyCode,
    #[error("no API key provided")]
    MissingCredential,
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("the model returned no code")]
    NoCodeGenerated,
}

/// Cut `code` to `max_chars` characters, appending a notice when anything
/// was removed.
pub fn truncate_for_review(code: &str, max_chars: usize) -> Cow<'_, str> {
    match code.char_indices().nth(max_chars) {
        Some((byte_index, _)) => Cow::Owned(format!("{}{TRUNCATION_NOTICE}", &code[..byte_index])),
        None => Cow::Borrowed(code),
    }
}

/// Map a raw review reply to a result.
///
/// Any finding makes the result `issues_found`. Recognised headers with
/// only "none found" lines make it `clean`; a reply with no recognised
/// header at all is `unparsed`.
pub fn interpret_review(aspect: ReviewAspect, raw: &str) -> CodeReviewResult {
    let sections = ReviewSections::parse(raw);
    if !sections.is_empty() {
        CodeReviewResult::issues_found(
            aspect,
            sections.issues,
            sections.recommendations,
            sections.steps,
        )
    } else if sections.is_structured() || raw.trim().is_empty() {
        CodeReviewResult::clean(aspect)
    } else {
        CodeReviewResult::unparsed(aspect, raw.trim())
    }
}

fn validate(code: &str, api_key: &ApiKey) -> Result<(), ReviewError> {
    if code.trim().is_empty() {
        return Err(ReviewError::EmptyCode);
    }
    if api_key.is_blank() {
        return Err(ReviewError::MissingCredential);
    }
    Ok(())
}

pub struct CodeReviewAgent {
    provider: Arc<dyn LlmProvider>,
    config: ReviewConfig,
}

impl CodeReviewAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: ReviewConfig) -> Self {
        Self { provider, config }
    }

    /// Review `code` for every aspect. Always returns four results in
    /// [`ReviewAspect::ALL`] order; a failing aspect yields a `failed`
    /// result without affecting the others.
    pub async fn review(
        &self,
        code: &str,
        file_name: &str,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeReviewResult>, ReviewError> {
        validate(code, api_key)?;

        let (span, trace_id) =
            sc_telemetry::tracing_setup::create_operation_span("code_review", file_name);
        async move {
            let code = truncate_for_review(code, self.config.max_code_chars);
            if matches!(code, Cow::Owned(_)) {
                warn!(
                    limit = self.config.max_code_chars,
                    "code exceeds review limit; truncated for analysis"
                );
            }
            info!(trace_id = %trace_id, parallel = self.config.parallel, "starting code review");

            let results = if self.config.parallel {
                join_all(ReviewAspect::ALL.iter().map(|aspect| {
                    self.review_aspect(*aspect, &code, file_name, api_key, cancel)
                }))
                .await
            } else {
                let mut results = Vec::with_capacity(ReviewAspect::ALL.len());
                for aspect in ReviewAspect::ALL {
                    let result = self
                        .review_aspect(aspect, &code, file_name, api_key, cancel)
                        .await;
                    results.push(result);
                }
                results
            };

            if cancel.is_cancelled() {
                return Err(ReviewError::Llm(LlmError::Cancelled));
            }
            info!(
                with_issues = results.iter().filter(|r| r.has_issues).count(),
                failed = results.iter().filter(|r| r.is_failed()).count(),
                "code review complete"
            );
            Ok(results)
        }
        .instrument(span)
        .await
    }

    /// Review a single aspect. `code` is sent as given.
    pub async fn review_aspect(
        &self,
        aspect: ReviewAspect,
        code: &str,
        file_name: &str,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> CodeReviewResult {
        let prompt = prompts::review(aspect, code, file_name);
        match ask(self.provider.as_ref(), &prompt, api_key, cancel).await {
            Ok(raw) => {
                let result = interpret_review(aspect, &raw);
                debug!(
                    aspect = %aspect,
                    outcome = ?result.outcome,
                    issues = result.issues.len(),
                    "review aspect parsed"
                );
                result
            }
            Err(error) => {
                warn!(aspect = %aspect, error = %error, "review aspect failed");
                CodeReviewResult::failed(aspect, error.user_message())
            }
        }
    }

    /// Generate code addressing the findings of `result`, returning a copy
    /// of it with `generated_code` filled in.
    pub async fn implement_fix(
        &self,
        code: &str,
        file_name: &str,
        result: &CodeReviewResult,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> Result<CodeReviewResult, ReviewError> {
        validate(code, api_key)?;

        let prompt = prompts::review_fix(code, file_name, result);
        let raw = ask(self.provider.as_ref(), &prompt, api_key, cancel).await?;
        let new_code = strip_code_fence(&parse_generation_response(&raw).new_code);
        if new_code.is_empty() {
            return Err(ReviewError::NoCodeGenerated);
        }
        info!(aspect = %result.aspect, code_chars = new_code.len(), "review fix generated");
        Ok(result.clone().with_generated_code(new_code))
    }
}
