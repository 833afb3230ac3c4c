//! Agents that explain a requested code change and review code.
//!
//! The explanation pipeline runs four stages in order (context-gathering
//! analysis, observations, approach, detailed plan) and can stream each
//! stage to a [`orchestrator::StageSink`]. The review agent checks code for
//! bugs, performance, security and clarity.

pub mod analysis;
pub mod assistant;
pub mod implementation;
pub mod orchestrator;
pub mod prompts;
pub mod review;
pub mod stages;
pub mod state_machine;

pub use assistant::CodeAssistant;
pub use orchestrator::{AgentOrchestrator, ChannelSink, PipelineError, StageSink};
pub use review::{CodeReviewAgent, ReviewError};
pub use stages::{StageFailure, StageInput, StageOutcome};
