//! AgentOrchestrator -- runs analysis -> observations -> approach -> plan
//! for one change request, optionally streaming each stage to a sink.

use std::sync::Arc;

use sc_core::config::AnalysisConfig;
use sc_core::parsing::extract_plan_steps;
use sc_core::types::{AgentResponse, StageKind, StageUpdate};
use sc_harness::ToolRegistry;
use sc_intelligence::{ApiKey, LlmError, LlmProvider};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::analysis::{ContextAnalysisAgent, GapPolicy};
use crate::stages::{
    ApproachAgent, ObservationAgent, PlanningAgent, StageFailure, StageInput, StageOutcome,
};
use crate::state_machine::{PipelineEvent, PipelineStateMachine, StateMachineError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: StageKind, reason: String },
    #[error("the detailed plan contains no step headings")]
    NoPlanStepsFound,
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("the model returned no code")]
    NoCodeGenerated,
    #[error("pipeline cancelled")]
    Cancelled,
    #[error(transparent)]
    InvalidTransition(#[from] StateMachineError),
}

impl PipelineError {
    /// Map an LLM error, keeping cancellation distinct.
    pub fn from_llm(error: LlmError) -> Self {
        match error {
            LlmError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Llm(other),
        }
    }
}

impl From<StageFailure> for PipelineError {
    fn from(failure: StageFailure) -> Self {
        if failure.is_cancelled() {
            PipelineError::Cancelled
        } else if failure.fatal {
            PipelineError::Llm(failure.error)
        } else {
            PipelineError::StageFailed {
                stage: failure.stage,
                reason: failure.reason,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receives stage notifications as the pipeline progresses.
pub trait StageSink: Send + Sync {
    fn emit(&self, update: StageUpdate);
}

impl<F> StageSink for F
where
    F: Fn(StageUpdate) + Send + Sync,
{
    fn emit(&self, update: StageUpdate) {
        self(update)
    }
}

/// Forwards notifications into a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: flume::Sender<StageUpdate>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<StageUpdate>) -> Self {
        Self { tx }
    }

    /// A sink together with the receiving end of its channel.
    pub fn unbounded() -> (Self, flume::Receiver<StageUpdate>) {
        let (tx, rx) = flume::unbounded();
        (Self::new(tx), rx)
    }
}

impl StageSink for ChannelSink {
    fn emit(&self, update: StageUpdate) {
        if self.tx.send(update).is_err() {
            debug!("stage update dropped: receiver closed");
        }
    }
}

// ---------------------------------------------------------------------------
// AgentOrchestrator
// ---------------------------------------------------------------------------

/// Runs the four explanation stages in order.
///
/// A failed observations or approach stage is recorded in
/// [`AgentResponse::degraded_stages`] and its fallback text is used
/// downstream. A failed analysis or planning stage, a fatal model error,
/// or a plan without `### Step` headings ends the run with an error.
pub struct AgentOrchestrator {
    analysis: ContextAnalysisAgent,
    observation: ObservationAgent,
    approach: ApproachAgent,
    planning: PlanningAgent,
}

impl AgentOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            analysis: ContextAnalysisAgent::new(provider.clone(), tools, config),
            observation: ObservationAgent::new(provider.clone()),
            approach: ApproachAgent::new(provider.clone()),
            planning: PlanningAgent::new(provider),
        }
    }

    /// Replace the analysis stage's gap policy.
    pub fn with_gap_policy(mut self, policy: Arc<dyn GapPolicy>) -> Self {
        self.analysis = self.analysis.with_gap_policy(policy);
        self
    }

    /// Run the pipeline. With a sink, every stage is announced by a
    /// placeholder (`is_complete: false`) and reported when done.
    pub async fn run(
        &self,
        input: &StageInput<'_>,
        api_key: &ApiKey,
        sink: Option<&dyn StageSink>,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse> {
        let (span, trace_id) =
            sc_telemetry::tracing_setup::create_operation_span("pipeline", input.file_name);
        async move {
            info!(
                trace_id = %trace_id,
                code_chars = input.code.len(),
                "starting explanation pipeline"
            );
            let mut machine = PipelineStateMachine::new();
            let result = self.run_stages(input, api_key, sink, cancel, &mut machine).await;
            match &result {
                Ok(response) => info!(
                    degraded = ?response.degraded_stages,
                    plan_chars = response.detailed_plan.len(),
                    "explanation pipeline complete"
                ),
                Err(e) => {
                    if machine.can_transition(PipelineEvent::Fail) {
                        machine.transition(PipelineEvent::Fail)?;
                    }
                    warn!(state = %machine.state(), error = %e, "explanation pipeline failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        input: &StageInput<'_>,
        api_key: &ApiKey,
        sink: Option<&dyn StageSink>,
        cancel: &CancellationToken,
        machine: &mut PipelineStateMachine,
    ) -> Result<AgentResponse> {
        let emit = |update: StageUpdate| {
            if let Some(sink) = sink {
                sink.emit(update);
            }
        };
        let mut degraded_stages = Vec::new();

        // Thinking
        machine.transition(PipelineEvent::Start)?;
        emit(StageUpdate::pending(StageKind::Thinking));
        let thinking = match self.analysis.run(input, api_key, cancel).await {
            StageOutcome::Completed(report) => report.summary,
            StageOutcome::Failed(failure) => return Err(failure.into()),
        };
        emit(StageUpdate::completed(StageKind::Thinking, thinking.clone()));
        machine.transition(PipelineEvent::StageCompleted)?;

        // Observations
        emit(StageUpdate::pending(StageKind::Observations));
        let observations = match self.observation.run(input, &thinking, api_key, cancel).await {
            StageOutcome::Completed(points) => points,
            StageOutcome::Failed(failure) => {
                degrade(failure, &mut degraded_stages)?;
                vec![StageKind::Observations.fallback_text().to_string()]
            }
        };
        emit(flag_degraded(
            StageUpdate::observations(observations.clone()),
            &degraded_stages,
        ));
        machine.transition(PipelineEvent::StageCompleted)?;

        // Approach
        emit(StageUpdate::pending(StageKind::Approach));
        let approach = match self
            .approach
            .run(input, &thinking, &observations, api_key, cancel)
            .await
        {
            StageOutcome::Completed(text) => text,
            StageOutcome::Failed(failure) => {
                degrade(failure, &mut degraded_stages)?;
                StageKind::Approach.fallback_text().to_string()
            }
        };
        emit(flag_degraded(
            StageUpdate::completed(StageKind::Approach, approach.clone()),
            &degraded_stages,
        ));
        machine.transition(PipelineEvent::StageCompleted)?;

        // Plan
        emit(StageUpdate::pending(StageKind::Plan));
        let detailed_plan = self
            .planning
            .run(input, &thinking, &approach, api_key, cancel)
            .await
            .into_result()?;
        if extract_plan_steps(&detailed_plan).is_empty() {
            return Err(PipelineError::NoPlanStepsFound);
        }
        emit(StageUpdate::completed(StageKind::Plan, detailed_plan.clone()));
        machine.transition(PipelineEvent::StageCompleted)?;

        Ok(AgentResponse {
            thinking,
            observations,
            approach,
            detailed_plan,
            degraded_stages,
        })
    }
}

/// Record a non-fatal stage failure, or escalate a fatal one.
fn degrade(failure: StageFailure, degraded: &mut Vec<StageKind>) -> Result<()> {
    if failure.fatal {
        return Err(failure.into());
    }
    warn!(stage = %failure.stage, reason = %failure.reason, "stage degraded to fallback text");
    degraded.push(failure.stage);
    Ok(())
}

fn flag_degraded(update: StageUpdate, degraded: &[StageKind]) -> StageUpdate {
    if degraded.contains(&update.kind) {
        update.degraded()
    } else {
        update
    }
}
