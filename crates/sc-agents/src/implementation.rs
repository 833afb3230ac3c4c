//! Turning an accepted plan into code.

use std::sync::Arc;

use sc_core::parsing::{extract_plan_steps, parse_generation_response, strip_code_fence};
use sc_core::types::{AgentResponse, PlanStep};
use sc_intelligence::{ApiKey, LlmProvider};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orchestrator::{PipelineError, Result};
use crate::prompts;
use crate::stages::{ask, StageInput};

/// Generated replacement for the target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    pub new_code: String,
    pub explanation: String,
    pub plan: Vec<PlanStep>,
}

/// Plan steps of a finished pipeline run, from its `### Step <n>:` headings.
pub fn plan_steps(response: &AgentResponse) -> Result<Vec<PlanStep>> {
    if response.detailed_plan.trim().is_empty() {
        return Err(PipelineError::MissingPrerequisite(
            "no detailed plan; run the explanation pipeline first".to_string(),
        ));
    }
    let steps = extract_plan_steps(&response.detailed_plan);
    if steps.is_empty() {
        return Err(PipelineError::NoPlanStepsFound);
    }
    Ok(steps)
}

pub struct ImplementationAgent {
    provider: Arc<dyn LlmProvider>,
}

impl ImplementationAgent {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Ask the model for the complete file that carries out `steps`.
    ///
    /// The returned plan is the one the model reports, or `steps` when the
    /// reply has no plan section.
    pub async fn generate(
        &self,
        input: &StageInput<'_>,
        steps: &[PlanStep],
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> Result<Implementation> {
        if steps.is_empty() {
            return Err(PipelineError::NoPlanStepsFound);
        }

        let prompt = prompts::implementation(input, steps);
        let raw = ask(self.provider.as_ref(), &prompt, api_key, cancel)
            .await
            .map_err(PipelineError::from_llm)?;

        let parsed = parse_generation_response(&raw);
        let new_code = strip_code_fence(&parsed.new_code);
        if new_code.trim().is_empty() {
            return Err(PipelineError::NoCodeGenerated);
        }
        info!(
            file = input.file_name,
            steps = steps.len(),
            code_chars = new_code.len(),
            "implementation generated"
        );

        let plan = if parsed.plan.is_empty() {
            steps.to_vec()
        } else {
            parsed.plan
        };
        Ok(Implementation {
            new_code,
            explanation: parsed.explanation,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_intelligence::MockProvider;

    fn input() -> StageInput<'static> {
        StageInput {
            code: "function f(x) { return x; }",
            instruction: "add input validation",
            file_name: "f.js",
        }
    }

    #[test]
    fn test_plan_steps_requires_plan() {
        let err = plan_steps(&AgentResponse::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingPrerequisite(_)));
    }

    #[test]
    fn test_plan_steps_without_headings() {
        let response = AgentResponse {
            detailed_plan: "# Implementation Plan\nJust do it.".into(),
            ..Default::default()
        };
        assert!(matches!(
            plan_steps(&response).unwrap_err(),
            PipelineError::NoPlanStepsFound
        ));
    }

    #[tokio::test]
    async fn test_generate_parses_markers_and_strips_fence() {
        let reply = "PLAN_START\n1. Check x\nPLAN_END\nEXPLANATION_START\nGuards x.\nEXPLANATION_END\n\
                     NEW_CODE_START\n```js\nfunction f(x) { if (x == null) throw new Error(); return x; }\n```\nNEW_CODE_END";
        let agent = ImplementationAgent::new(Arc::new(MockProvider::new().with_response(reply)));
        let steps = vec![PlanStep::new(1, "Validate x")];

        let implementation = agent
            .generate(&input(), &steps, &ApiKey::new("k"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            implementation.new_code,
            "function f(x) { if (x == null) throw new Error(); return x; }"
        );
        assert_eq!(implementation.explanation, "Guards x.");
        assert_eq!(implementation.plan, vec![PlanStep::new(1, "Check x")]);
    }

    #[tokio::test]
    async fn test_generate_refuses_empty_plan_without_calling_model() {
        let provider = Arc::new(MockProvider::new());
        let agent = ImplementationAgent::new(provider.clone());
        let err = agent
            .generate(&input(), &[], &ApiKey::new("k"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoPlanStepsFound));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_without_code_section() {
        let agent = ImplementationAgent::new(Arc::new(
            MockProvider::new().with_response("EXPLANATION_START\nnothing\nEXPLANATION_END"),
        ));
        let err = agent
            .generate(
                &input(),
                &[PlanStep::new(1, "x")],
                &ApiKey::new("k"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoCodeGenerated));
    }
}
