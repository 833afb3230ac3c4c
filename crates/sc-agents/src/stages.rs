use std::sync::Arc;

use sc_core::parsing::extract_numbered_list;
use sc_core::types::StageKind;
use sc_intelligence::{ApiKey, LlmError, LlmProvider};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::prompts;

// ---------------------------------------------------------------------------
// Shared input
// ---------------------------------------------------------------------------

/// The change request every stage works from.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub code: &'a str,
    pub instruction: &'a str,
    pub file_name: &'a str,
}

// ---------------------------------------------------------------------------
// StageOutcome
// ---------------------------------------------------------------------------

/// Why a stage produced no output.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: StageKind,
    /// Human-readable cause.
    pub reason: String,
    /// Set when no later stage can succeed either (bad credential or
    /// cancellation).
    pub fatal: bool,
    pub error: LlmError,
}

impl StageFailure {
    pub fn new(stage: StageKind, error: LlmError) -> Self {
        Self {
            stage,
            reason: error.user_message(),
            fatal: error.is_fatal(),
            error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error == LlmError::Cancelled
    }
}

/// Result of running one stage agent.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed(StageFailure),
}

impl<T> StageOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    pub fn into_result(self) -> Result<T, StageFailure> {
        match self {
            StageOutcome::Completed(value) => Ok(value),
            StageOutcome::Failed(failure) => Err(failure),
        }
    }

    fn from_result(stage: StageKind, result: Result<T, LlmError>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(error) => {
                warn!(stage = %stage, error = %error, "stage agent failed");
                StageOutcome::Failed(StageFailure::new(stage, error))
            }
        }
    }
}

/// Send `prompt` to `provider`, giving up with [`LlmError::Cancelled`] as
/// soon as `cancel` fires.
pub(crate) async fn ask(
    provider: &dyn LlmProvider,
    prompt: &str,
    api_key: &ApiKey,
    cancel: &CancellationToken,
) -> Result<String, LlmError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        response = provider.complete(prompt, api_key) => response.map(|r| r.content),
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Turns the analysis into a short numbered list of observations.
pub struct ObservationAgent {
    provider: Arc<dyn LlmProvider>,
}

impl ObservationAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(
        &self,
        input: &StageInput<'_>,
        thinking: &str,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> StageOutcome<Vec<String>> {
        let prompt = prompts::observations(input, thinking);
        let result = ask(self.provider.as_ref(), &prompt, api_key, cancel)
            .await
            .map(|reply| extract_numbered_list(&reply));
        if let Ok(points) = &result {
            info!(count = points.len(), "observations generated");
        }
        StageOutcome::from_result(StageKind::Observations, result)
    }
}

// ---------------------------------------------------------------------------
// Approach
// ---------------------------------------------------------------------------

/// Produces the high-level strategy; the reply is used verbatim.
pub struct ApproachAgent {
    provider: Arc<dyn LlmProvider>,
}

impl ApproachAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(
        &self,
        input: &StageInput<'_>,
        thinking: &str,
        observations: &[String],
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> StageOutcome<String> {
        let prompt = prompts::approach(input, thinking, observations);
        let result = ask(self.provider.as_ref(), &prompt, api_key, cancel).await;
        StageOutcome::from_result(StageKind::Approach, result)
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Produces the phased markdown plan with `### Step <n>:` headings.
pub struct PlanningAgent {
    provider: Arc<dyn LlmProvider>,
}

impl PlanningAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(
        &self,
        input: &StageInput<'_>,
        thinking: &str,
        approach: &str,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> StageOutcome<String> {
        let prompt = prompts::planning(input, thinking, approach);
        let result = ask(self.provider.as_ref(), &prompt, api_key, cancel).await;
        if let Ok(plan) = &result {
            info!(chars = plan.len(), "detailed plan received");
        }
        StageOutcome::from_result(StageKind::Plan, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_intelligence::MockProvider;

    fn input() -> StageInput<'static> {
        StageInput {
            code: "fn f() {}",
            instruction: "add logging",
            file_name: "f.rs",
        }
    }

    #[tokio::test]
    async fn test_observations_parse_numbered_lines() {
        let provider = Arc::new(
            MockProvider::new().with_response("Intro\n1. First point\n2.  Second point\nTrailer"),
        );
        let agent = ObservationAgent::new(provider);
        let outcome = agent
            .run(&input(), "thinking", &ApiKey::new("k"), &CancellationToken::new())
            .await;
        assert_eq!(
            outcome,
            StageOutcome::Completed(vec!["First point".to_string(), "Second point".to_string()])
        );
    }

    #[tokio::test]
    async fn test_failure_is_tagged_not_fallback_text() {
        let provider = Arc::new(MockProvider::new().with_error(LlmError::RateLimited {
            message: "slow down".into(),
        }));
        let agent = ApproachAgent::new(provider);
        let outcome = agent
            .run(&input(), "t", &[], &ApiKey::new("k"), &CancellationToken::new())
            .await;
        let failure = outcome.into_result().unwrap_err();
        assert_eq!(failure.stage, StageKind::Approach);
        assert!(!failure.fatal);
        assert_eq!(failure.reason, "Rate limit exceeded - please try again later");
    }

    #[tokio::test]
    async fn test_invalid_credential_is_fatal() {
        let provider = Arc::new(MockProvider::new().with_error(LlmError::InvalidCredential {
            message: "bad key".into(),
        }));
        let agent = PlanningAgent::new(provider);
        let outcome = agent
            .run(&input(), "t", "a", &ApiKey::new("k"), &CancellationToken::new())
            .await;
        assert!(outcome.into_result().unwrap_err().fatal);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let provider = Arc::new(MockProvider::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agent = PlanningAgent::new(provider.clone());
        let failure = agent
            .run(&input(), "t", "a", &ApiKey::new("k"), &cancel)
            .await
            .into_result()
            .unwrap_err();
        assert!(failure.is_cancelled());
        assert!(failure.fatal);
        assert_eq!(provider.call_count(), 0);
    }
}
