//! Context-gathering analysis: the first pipeline stage.
//!
//! The agent seeds a [`ContextGatheringResult`] with the inspection tools,
//! then runs a bounded think/assess/gather loop against the model. Each
//! model reply is appended to a transcript; a [`GapPolicy`] decides whether
//! the context is sufficient or which gaps to fill next. The stage output
//! is a fixed-template summary of the gathered context and the transcript.

use std::sync::Arc;

use sc_core::config::AnalysisConfig;
use sc_core::types::{ContextGap, ContextGatheringResult, ContextPatch, GapKind, StageKind};
use sc_harness::builtin_tools::{DESCRIBE_DEPENDENCIES, DESCRIBE_PROJECT, FIND_IDENTIFIER, SEARCH};
use sc_harness::{ToolOutput, ToolRegistry};
use sc_intelligence::{ApiKey, LlmError, LlmProvider};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompts;
use crate::stages::{ask, StageFailure, StageInput, StageOutcome};

/// Words never used as search terms.
const STOP_WORDS: &[&str] = &[
    "add", "create", "implement", "the", "a", "an", "and", "or", "but", "in", "on", "at", "to",
    "for", "of", "with", "by",
];

/// Query used to widen the search when nothing relevant was found.
const BROAD_SEARCH_QUERY: &str = "code implementation";

// ---------------------------------------------------------------------------
// Gap policy
// ---------------------------------------------------------------------------

/// Decides, after each model reply, whether more context is needed.
pub trait GapPolicy: Send + Sync {
    fn assess(&self, reply: &str, context: &ContextGatheringResult) -> ContextGap;
}

/// Length and keyword heuristics over the gathered context.
///
/// Starts at 0.5 confidence and deducts 0.2 for a short project structure
/// (< 200 chars), 0.3 when no relevant file was found and 0.2 for short
/// dependency information (< 100 chars). The reply asks for more context
/// when it mentions "need more", "gather" or "additional", or when the
/// confidence is below the threshold.
///
/// The best possible score is 0.5, so with any threshold above that the
/// loop runs until its iteration limit.
#[derive(Debug, Clone)]
pub struct HeuristicGapPolicy {
    pub confidence_threshold: f64,
}

impl HeuristicGapPolicy {
    pub const BASE_CONFIDENCE: f64 = 0.5;
    pub const MIN_STRUCTURE_CHARS: usize = 200;
    pub const MIN_DEPENDENCY_CHARS: usize = 100;

    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }
}

impl Default for HeuristicGapPolicy {
    fn default() -> Self {
        Self::new(AnalysisConfig::default().confidence_threshold)
    }
}

impl GapPolicy for HeuristicGapPolicy {
    fn assess(&self, reply: &str, context: &ContextGatheringResult) -> ContextGap {
        let mut gaps = Vec::new();
        let mut confidence = Self::BASE_CONFIDENCE;

        if context.project_structure.chars().count() < Self::MIN_STRUCTURE_CHARS {
            gaps.push(GapKind::ProjectStructure);
            confidence -= 0.2;
        }
        if context.relevant_files.is_empty() {
            gaps.push(GapKind::RelevantFiles);
            confidence -= 0.3;
        }
        if context.dependencies.chars().count() < Self::MIN_DEPENDENCY_CHARS {
            gaps.push(GapKind::Dependencies);
            confidence -= 0.2;
        }

        let reply = reply.to_lowercase();
        let asks_for_more = ["need more", "gather", "additional"]
            .iter()
            .any(|phrase| reply.contains(phrase));

        let confidence = confidence.max(0.0);
        ContextGap::new(
            asks_for_more || confidence < self.confidence_threshold,
            gaps,
            confidence,
        )
    }
}

// ---------------------------------------------------------------------------
// Term extraction
// ---------------------------------------------------------------------------

/// Lower-cased words of `instruction` longer than three characters that are
/// not stop words, at most `max`.
pub fn extract_search_terms(instruction: &str, max: usize) -> Vec<String> {
    instruction
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Identifier-like tokens (an ASCII letter followed by ASCII letters or
/// digits, bounded by non-word characters) longer than three characters,
/// at most `max`.
pub fn extract_identifier_candidates(instruction: &str, max: usize) -> Vec<String> {
    instruction
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| {
            token.len() > 3
                && token.starts_with(|c: char| c.is_ascii_alphabetic())
                && token.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .take(max)
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Output of a completed analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    /// The narrative passed downstream as the `thinking` stage content.
    pub summary: String,
    pub context: ContextGatheringResult,
    pub iterations: u32,
    /// Confidence reached when the loop ended.
    pub confidence: f64,
}

fn final_summary(transcript: &str, context: &ContextGatheringResult) -> String {
    format!(
        "# Intelligent Analysis Complete

## Context Gathered
- **Project Structure**: Analyzed project organization and file types
- **Relevant Files**: Found {files} relevant files in codebase
- **Existing Variables**: Identified {variables} variable patterns
- **Dependencies**: Analyzed file and project dependencies

## Thinking Process
{transcript}

## Final Assessment
Based on comprehensive context gathering, I now have a complete understanding of:
1. The project structure and organization
2. Existing code patterns and implementations
3. Variable naming conventions and usage
4. Dependencies and imports

This context will inform the subsequent observation, approach, and planning phases to ensure accurate and non-redundant implementation.",
        files = context.relevant_files.len(),
        variables = context.existing_variables.len(),
    )
}

// ---------------------------------------------------------------------------
// ContextAnalysisAgent
// ---------------------------------------------------------------------------

pub struct ContextAnalysisAgent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    policy: Arc<dyn GapPolicy>,
    config: AnalysisConfig,
}

impl ContextAnalysisAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            policy: Arc::new(HeuristicGapPolicy::new(config.confidence_threshold)),
            config,
        }
    }

    pub fn with_gap_policy(mut self, policy: Arc<dyn GapPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full analysis for `input`.
    ///
    /// Model failures inside the loop are written into the transcript and
    /// the loop carries on. A rejected credential or cancellation ends the
    /// stage at once, and so does a loop in which no reply succeeded.
    pub async fn run(
        &self,
        input: &StageInput<'_>,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> StageOutcome<AnalysisReport> {
        let mut context = self.seed_context(input).await;

        let mut transcript = String::new();
        let mut confidence = 0.0;
        let mut iteration = 0;
        let mut successful_replies = 0;
        let mut last_error = None;

        while iteration < self.config.max_iterations
            && confidence < self.config.confidence_threshold
        {
            if iteration > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.fail(LlmError::Cancelled),
                    _ = tokio::time::sleep(self.config.iteration_delay()) => {}
                }
            }
            debug!(
                iteration = iteration + 1,
                max = self.config.max_iterations,
                "thinking iteration"
            );

            let prompt = prompts::thinking_iteration(
                input,
                &context,
                iteration,
                self.config.structure_preview_chars,
                self.config.dependency_preview_chars,
            );
            let reply = match ask(self.provider.as_ref(), &prompt, api_key, cancel).await {
                Ok(reply) => {
                    successful_replies += 1;
                    reply
                }
                Err(error) if error.is_fatal() => return self.fail(error),
                Err(error) => {
                    warn!(iteration = iteration + 1, error = %error, "thinking iteration failed");
                    let text = format!("Error getting model response: {}", error.user_message());
                    last_error = Some(error);
                    text
                }
            };
            transcript.push_str(&format!("\n\n--- Iteration {} ---\n{reply}", iteration + 1));

            let gap = self.policy.assess(&reply, &context);
            if gap.needs_more_context {
                debug!(
                    gaps = ?gap.gaps,
                    confidence = gap.confidence,
                    "gathering additional context"
                );
                let patch = self.gather_additional(input, &gap.gaps).await;
                context.merge(patch);
                confidence = gap.confidence;
            } else {
                confidence = 1.0;
            }
            iteration += 1;
        }

        if successful_replies == 0 {
            return self.fail(last_error.unwrap_or(LlmError::MalformedResponse(
                "analysis loop produced no model reply".to_string(),
            )));
        }

        let summary = final_summary(&transcript, &context);
        context.merge(ContextPatch {
            analysis: Some(transcript),
            ..Default::default()
        });
        info!(
            iterations = iteration,
            confidence,
            relevant_files = context.relevant_files.len(),
            "analysis complete"
        );
        StageOutcome::Completed(AnalysisReport {
            summary,
            context,
            iterations: iteration,
            confidence,
        })
    }

    fn fail(&self, error: LlmError) -> StageOutcome<AnalysisReport> {
        warn!(error = %error, "analysis aborted");
        StageOutcome::Failed(StageFailure::new(StageKind::Thinking, error))
    }

    /// Initial pass: project layout, keyword search, identifier lookup and
    /// the target file's dependencies. Tool errors degrade to a note.
    async fn seed_context(&self, input: &StageInput<'_>) -> ContextGatheringResult {
        let project_structure = self
            .invoke(DESCRIBE_PROJECT, json!({ "depth": "medium" }))
            .await
            .map(|out| out.text)
            .unwrap_or_else(|| "Unable to analyze project structure".to_string());

        let relevant_files = self.search_relevant(input.instruction).await;
        let existing_variables = self.search_identifiers(input.instruction).await;

        let dependencies = self
            .invoke(DESCRIBE_DEPENDENCIES, json!({ "filePath": input.file_name }))
            .await
            .map(|out| out.text)
            .unwrap_or_else(|| "Unable to analyze dependencies".to_string());

        ContextGatheringResult {
            project_structure,
            relevant_files,
            existing_variables,
            dependencies,
            analysis: String::new(),
        }
    }

    async fn gather_additional(&self, input: &StageInput<'_>, gaps: &[GapKind]) -> ContextPatch {
        let mut patch = ContextPatch::default();
        for gap in gaps {
            match gap {
                GapKind::ProjectStructure => {
                    patch.project_structure = self
                        .invoke(DESCRIBE_PROJECT, json!({ "depth": "deep" }))
                        .await
                        .map(|out| out.text);
                }
                GapKind::RelevantFiles => {
                    patch.relevant_files = self.search_relevant(BROAD_SEARCH_QUERY).await;
                }
                GapKind::Dependencies => {
                    // Rescan the target file, now with development dependencies.
                    let params = json!({ "filePath": input.file_name, "includeDev": true });
                    patch.dependencies = self
                        .invoke(DESCRIBE_DEPENDENCIES, params)
                        .await
                        .map(|out| out.text);
                }
            }
        }
        patch
    }

    /// Search results for each term of `text` that matched something.
    async fn search_relevant(&self, text: &str) -> Vec<String> {
        let mut results = Vec::new();
        for term in extract_search_terms(text, self.config.max_search_terms) {
            if let Some(out) = self.invoke(SEARCH, json!({ "query": term })).await {
                if !out.found_nothing {
                    results.push(out.text);
                }
            }
        }
        results
    }

    async fn search_identifiers(&self, text: &str) -> Vec<String> {
        let mut results = Vec::new();
        for name in extract_identifier_candidates(text, self.config.max_identifier_terms) {
            let params = json!({ "name": name, "scope": "project_wide" });
            if let Some(out) = self.invoke(FIND_IDENTIFIER, params).await {
                if !out.found_nothing {
                    results.push(out.text);
                }
            }
        }
        results
    }

    async fn invoke(&self, tool: &str, params: serde_json::Value) -> Option<ToolOutput> {
        match self.tools.invoke(tool, params).await {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(tool, error = %e, "context tool failed");
                None
            }
        }
    }
}
