use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StageKind
// ---------------------------------------------------------------------------

/// One of the four explanation stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Thinking,
    Observations,
    Approach,
    Plan,
}

impl StageKind {
    /// All stages in the order the pipeline runs them.
    pub const ALL: [StageKind; 4] = [
        StageKind::Thinking,
        StageKind::Observations,
        StageKind::Approach,
        StageKind::Plan,
    ];

    /// Progress text shown while the stage is still running.
    pub fn progress_message(&self) -> &'static str {
        match self {
            StageKind::Thinking => "Analyzing code context...",
            StageKind::Observations => "Generating key observations...",
            StageKind::Approach => "Generating strategic approach...",
            StageKind::Plan => "Generating implementation plan...",
        }
    }

    /// Literal text substituted for the stage output when its agent fails.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            StageKind::Thinking => "Error analyzing code context",
            StageKind::Observations => "Error generating observations",
            StageKind::Approach => "Error defining approach",
            StageKind::Plan => "Error creating detailed plan",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Thinking => write!(f, "thinking"),
            StageKind::Observations => write!(f, "observations"),
            StageKind::Approach => write!(f, "approach"),
            StageKind::Plan => write!(f, "plan"),
        }
    }
}

// ---------------------------------------------------------------------------
// StageUpdate
// ---------------------------------------------------------------------------

/// Incremental notification delivered to a streaming caller.
///
/// For [`StageKind::Observations`] the completed notification carries
/// `points` and an empty `content`; every other stage populates `content`
/// and leaves `points` unset. `degraded` marks a completed notification
/// whose payload is the stage's fallback text rather than a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    #[serde(rename = "type")]
    pub kind: StageKind,
    pub content: String,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl StageUpdate {
    /// Placeholder emitted before a stage starts.
    pub fn pending(kind: StageKind) -> Self {
        Self {
            kind,
            content: kind.progress_message().to_string(),
            is_complete: false,
            points: None,
            degraded: false,
        }
    }

    /// Completed notification for a text-valued stage.
    pub fn completed(kind: StageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            is_complete: true,
            points: None,
            degraded: false,
        }
    }

    /// Completed notification for the observations stage.
    pub fn observations(points: Vec<String>) -> Self {
        Self {
            kind: StageKind::Observations,
            content: String::new(),
            is_complete: true,
            points: Some(points),
            degraded: false,
        }
    }

    /// Mark the payload as the stage's fallback.
    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

// ---------------------------------------------------------------------------
// AgentResponse
// ---------------------------------------------------------------------------

/// Aggregate output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub thinking: String,
    pub observations: Vec<String>,
    pub approach: String,
    pub detailed_plan: String,
    /// Intermediate stages whose agent failed; their slot holds the
    /// stage's fallback text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<StageKind>,
}

impl AgentResponse {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_stages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PlanStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Executing,
    Completed,
}

impl StepStatus {
    /// Returns `true` when moving from `self` to `target` is allowed.
    pub fn can_transition_to(&self, target: &StepStatus) -> bool {
        matches!(
            (self, target),
            (StepStatus::Pending, StepStatus::Executing)
                | (StepStatus::Executing, StepStatus::Completed)
        )
    }
}

/// One actionable step derived from the detailed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: u32,
    pub description: String,
    #[serde(default)]
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(step: u32, description: impl Into<String>) -> Self {
        Self {
            step,
            description: description.into(),
            status: StepStatus::Pending,
        }
    }

    /// Advance the step's status. Returns `false` (and leaves the status
    /// untouched) when the transition is not allowed.
    pub fn advance(&mut self, target: StepStatus) -> bool {
        if self.status.can_transition_to(&target) {
            self.status = target;
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Context gathering
// ---------------------------------------------------------------------------

/// Category of missing context detected by gap analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    ProjectStructure,
    RelevantFiles,
    Dependencies,
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapKind::ProjectStructure => write!(f, "project_structure"),
            GapKind::RelevantFiles => write!(f, "relevant_files"),
            GapKind::Dependencies => write!(f, "dependencies"),
        }
    }
}

/// Result of one round of gap analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextGap {
    pub needs_more_context: bool,
    pub gaps: Vec<GapKind>,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
}

impl ContextGap {
    pub fn new(needs_more_context: bool, gaps: Vec<GapKind>, confidence: f64) -> Self {
        Self {
            needs_more_context,
            gaps,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Accumulated knowledge about the project, built up across iterations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextGatheringResult {
    pub project_structure: String,
    pub relevant_files: Vec<String>,
    pub existing_variables: Vec<String>,
    pub dependencies: String,
    pub analysis: String,
}

/// Partial update produced by a context-gathering pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub project_structure: Option<String>,
    pub relevant_files: Vec<String>,
    pub existing_variables: Vec<String>,
    pub dependencies: Option<String>,
    pub analysis: Option<String>,
}

impl ContextPatch {
    pub fn is_empty(&self) -> bool {
        self.project_structure.is_none()
            && self.relevant_files.is_empty()
            && self.existing_variables.is_empty()
            && self.dependencies.is_none()
            && self.analysis.is_none()
    }
}

impl ContextGatheringResult {
    /// Fold `patch` into `self`. Lists are appended, scalars are replaced
    /// only when the patch carries a value, so no list ever shrinks.
    pub fn merge(&mut self, patch: ContextPatch) {
        if let Some(structure) = patch.project_structure {
            self.project_structure = structure;
        }
        self.relevant_files.extend(patch.relevant_files);
        self.existing_variables.extend(patch.existing_variables);
        if let Some(dependencies) = patch.dependencies {
            self.dependencies = dependencies;
        }
        if let Some(analysis) = patch.analysis {
            self.analysis = analysis;
        }
    }
}

// ---------------------------------------------------------------------------
// Code review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAspect {
    Bug,
    Performance,
    Security,
    Clarity,
}

impl ReviewAspect {
    /// Every aspect, in the order results are reported.
    pub const ALL: [ReviewAspect; 4] = [
        ReviewAspect::Bug,
        ReviewAspect::Performance,
        ReviewAspect::Security,
        ReviewAspect::Clarity,
    ];

    /// Phrase used when the aspect came back clean.
    pub fn clean_phrase(&self) -> &'static str {
        match self {
            ReviewAspect::Bug => "No bugs detected",
            ReviewAspect::Performance => "No performance issues detected",
            ReviewAspect::Security => "No security issues detected",
            ReviewAspect::Clarity => "No clarity issues detected",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReviewAspect::Bug => "Bug Analysis",
            ReviewAspect::Performance => "Performance Analysis",
            ReviewAspect::Security => "Security Analysis",
            ReviewAspect::Clarity => "Clarity Analysis",
        }
    }
}

impl fmt::Display for ReviewAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAspect::Bug => write!(f, "bug"),
            ReviewAspect::Performance => write!(f, "performance"),
            ReviewAspect::Security => write!(f, "security"),
            ReviewAspect::Clarity => write!(f, "clarity"),
        }
    }
}

impl FromStr for ReviewAspect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bug" | "bugs" => Ok(ReviewAspect::Bug),
            "performance" | "perf" => Ok(ReviewAspect::Performance),
            "security" => Ok(ReviewAspect::Security),
            "clarity" => Ok(ReviewAspect::Clarity),
            other => Err(format!("unknown review aspect: {other}")),
        }
    }
}

/// How a review result was arrived at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// The model reported at least one item.
    IssuesFound,
    /// Sections were recognised but held nothing beyond "none found" phrases.
    Clean,
    /// No recognised section header at all.
    Unparsed {
        #[serde(rename = "rawPreview")]
        raw_preview: String,
    },
    /// The model call itself failed.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeReviewResult {
    #[serde(rename = "type")]
    pub aspect: ReviewAspect,
    pub has_issues: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    pub outcome: ReviewOutcome,
}

/// Characters of raw model output kept on an unparsed result.
pub const RAW_PREVIEW_CHARS: usize = 200;

impl CodeReviewResult {
    pub fn issues_found(
        aspect: ReviewAspect,
        issues: Vec<String>,
        recommendations: Vec<String>,
        steps: Vec<String>,
    ) -> Self {
        Self {
            aspect,
            has_issues: true,
            issues,
            recommendations,
            steps,
            generated_code: None,
            outcome: ReviewOutcome::IssuesFound,
        }
    }

    pub fn clean(aspect: ReviewAspect) -> Self {
        Self {
            aspect,
            has_issues: false,
            issues: vec![aspect.clean_phrase().to_string()],
            recommendations: vec!["No recommendations needed".to_string()],
            steps: vec!["No action required".to_string()],
            generated_code: None,
            outcome: ReviewOutcome::Clean,
        }
    }

    pub fn unparsed(aspect: ReviewAspect, raw: &str) -> Self {
        Self {
            aspect,
            has_issues: false,
            issues: vec!["No specific issues detected".to_string()],
            recommendations: vec!["Code appears to be well-structured".to_string()],
            steps: vec!["Continue monitoring code quality".to_string()],
            generated_code: None,
            outcome: ReviewOutcome::Unparsed {
                raw_preview: raw.chars().take(RAW_PREVIEW_CHARS).collect(),
            },
        }
    }

    pub fn failed(aspect: ReviewAspect, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            aspect,
            has_issues: true,
            issues: vec![format!("API call failed: {reason}")],
            recommendations: vec!["Check API key and network connection".to_string()],
            steps: vec![
                "Verify API key".to_string(),
                "Check internet connection".to_string(),
                "Retry analysis".to_string(),
            ],
            generated_code: None,
            outcome: ReviewOutcome::Failed { reason },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ReviewOutcome::Failed { .. })
    }

    /// Attach code generated to address this result's findings.
    pub fn with_generated_code(mut self, code: impl Into<String>) -> Self {
        self.generated_code = Some(code.into());
        self
    }
}
