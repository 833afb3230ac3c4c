//! CodeAssistant -- the entry point hosts call.
//!
//! Bundles the explanation pipeline, implementation generation and code
//! review behind one value. Cancelling the token returned by
//! [`CodeAssistant::cancellation_token`] stops the run in flight; the next
//! call starts on a fresh token. Credentials are passed explicitly into
//! every call.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use sc_core::config::Config;
use sc_core::types::{AgentResponse, CodeReviewResult, PlanStep};
use sc_harness::ToolRegistry;
use sc_intelligence::{ApiKey, GeminiProvider, LlmError, LlmProvider};
use tokio_util::sync::CancellationToken;

use crate::implementation::{Implementation, ImplementationAgent};
use crate::orchestrator::{AgentOrchestrator, PipelineError, StageSink};
use crate::review::{CodeReviewAgent, ReviewError};
use crate::stages::StageInput;

pub struct CodeAssistant {
    orchestrator: AgentOrchestrator,
    implementer: ImplementationAgent,
    reviewer: CodeReviewAgent,
    cancel: Mutex<CancellationToken>,
}

impl CodeAssistant {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: ToolRegistry, config: &Config) -> Self {
        Self {
            orchestrator: AgentOrchestrator::new(
                provider.clone(),
                Arc::new(tools),
                config.analysis.clone(),
            ),
            implementer: ImplementationAgent::new(provider.clone()),
            reviewer: CodeReviewAgent::new(provider, config.review.clone()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Gemini-backed assistant whose tools read `general.workspace_root`
    /// (or the current directory).
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let provider = GeminiProvider::from_config(&config.provider)?;
        let root = match &config.general.workspace_root {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        Ok(Self::new(
            Arc::new(provider),
            ToolRegistry::with_builtins(root),
            config,
        ))
    }

    /// Use `token` for the next run instead of a private one.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token;
        self
    }

    /// Token governing the current (or next) run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.run_token()
    }

    /// A cancelled token only ever stops the run it was issued for.
    fn run_token(&self) -> CancellationToken {
        let mut token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    /// Run the four-stage explanation pipeline.
    pub async fn run_pipeline(
        &self,
        code: &str,
        instruction: &str,
        file_name: &str,
        credential: &ApiKey,
        sink: Option<&dyn StageSink>,
    ) -> Result<AgentResponse, PipelineError> {
        if credential.is_blank() {
            return Err(PipelineError::MissingPrerequisite("API key".to_string()));
        }
        let input = StageInput {
            code,
            instruction,
            file_name,
        };
        let cancel = self.run_token();
        self.orchestrator
            .run(&input, credential, sink, &cancel)
            .await
    }

    /// Review `code` for bugs, performance, security and clarity.
    pub async fn run_code_review(
        &self,
        code: &str,
        file_name: &str,
        credential: &ApiKey,
    ) -> Result<Vec<CodeReviewResult>, ReviewError> {
        let cancel = self.run_token();
        self.reviewer
            .review(code, file_name, credential, &cancel)
            .await
    }

    /// Generate the full new file for an accepted plan.
    pub async fn generate_implementation(
        &self,
        code: &str,
        instruction: &str,
        file_name: &str,
        plan_steps: &[PlanStep],
        credential: &ApiKey,
    ) -> Result<Implementation, PipelineError> {
        if credential.is_blank() {
            return Err(PipelineError::MissingPrerequisite("API key".to_string()));
        }
        let input = StageInput {
            code,
            instruction,
            file_name,
        };
        let cancel = self.run_token();
        self.implementer
            .generate(&input, plan_steps, credential, &cancel)
            .await
    }

    /// Generate code resolving one review result's findings.
    pub async fn implement_review_fix(
        &self,
        code: &str,
        file_name: &str,
        result: &CodeReviewResult,
        credential: &ApiKey,
    ) -> Result<CodeReviewResult, ReviewError> {
        let cancel = self.run_token();
        self.reviewer
            .implement_fix(code, file_name, result, credential, &cancel)
            .await
    }
}
