use sc_core::types::*;

// ---------------------------------------------------------------------------
// Context merge
// ---------------------------------------------------------------------------

#[test]
fn merge_never_shrinks_lists() {
    let mut ctx = ContextGatheringResult {
        project_structure: "src/\n  main.rs".into(),
        relevant_files: vec!["src/main.rs".into(), "src/lib.rs".into()],
        existing_variables: vec!["count".into()],
        dependencies: "serde".into(),
        analysis: String::new(),
    };

    let patches = vec![
        ContextPatch::default(),
        ContextPatch {
            relevant_files: vec!["src/util.rs".into()],
            ..Default::default()
        },
        ContextPatch {
            existing_variables: vec!["total".into(), "limit".into()],
            project_structure: Some("deeper tree".into()),
            ..Default::default()
        },
    ];

    for patch in patches {
        let before_files = ctx.relevant_files.len();
        let before_vars = ctx.existing_variables.len();
        ctx.merge(patch);
        assert!(ctx.relevant_files.len() >= before_files);
        assert!(ctx.existing_variables.len() >= before_vars);
    }

    assert_eq!(ctx.relevant_files.len(), 3);
    assert_eq!(ctx.existing_variables.len(), 3);
    assert_eq!(ctx.project_structure, "deeper tree");
}

#[test]
fn merge_keeps_scalars_when_patch_is_silent() {
    let mut ctx = ContextGatheringResult {
        dependencies: "tokio, serde".into(),
        ..Default::default()
    };
    ctx.merge(ContextPatch {
        relevant_files: vec!["a.rs".into()],
        ..Default::default()
    });
    assert_eq!(ctx.dependencies, "tokio, serde");
    assert!(ContextPatch::default().is_empty());
}

#[test]
fn context_gap_clamps_confidence() {
    assert_eq!(ContextGap::new(true, vec![], -0.4).confidence, 0.0);
    assert_eq!(ContextGap::new(false, vec![], 1.7).confidence, 1.0);
}

// ---------------------------------------------------------------------------
// Streaming notifications
// ---------------------------------------------------------------------------

#[test]
fn observations_update_serializes_points_and_empty_content() {
    let update = StageUpdate::observations(vec!["one".into(), "two".into()]);
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["type"], "observations");
    assert_eq!(json["content"], "");
    assert_eq!(json["isComplete"], true);
    assert_eq!(json["points"][1], "two");
    assert!(json.get("degraded").is_none());
}

#[test]
fn degraded_update_is_flagged_on_the_wire() {
    let update =
        StageUpdate::observations(vec!["Error generating observations".into()]).degraded();
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["degraded"], true);
    assert_eq!(json["isComplete"], true);

    let back: StageUpdate = serde_json::from_value(json).unwrap();
    assert!(back.degraded);
}

#[test]
fn text_update_omits_points() {
    let update = StageUpdate::completed(StageKind::Approach, "do it");
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["type"], "approach");
    assert!(json.get("points").is_none());

    let pending = StageUpdate::pending(StageKind::Plan);
    assert!(!pending.is_complete);
    assert!(!pending.content.is_empty());
}

#[test]
fn agent_response_uses_camel_case() {
    let response = AgentResponse {
        detailed_plan: "### Step 1: x".into(),
        ..Default::default()
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["detailedPlan"], "### Step 1: x");
    assert!(json.get("degradedStages").is_none());
    assert!(!response.is_degraded());
}

#[test]
fn stage_order_is_total() {
    assert!(StageKind::Thinking < StageKind::Observations);
    assert!(StageKind::Observations < StageKind::Approach);
    assert!(StageKind::Approach < StageKind::Plan);
    assert_eq!(StageKind::ALL.len(), 4);
}

// ---------------------------------------------------------------------------
// Plan steps
// ---------------------------------------------------------------------------

#[test]
fn plan_step_status_lifecycle() {
    let mut step = PlanStep::new(1, "Add validation");
    assert!(!step.advance(StepStatus::Completed));
    assert!(step.advance(StepStatus::Executing));
    assert!(step.advance(StepStatus::Completed));
    assert!(!step.advance(StepStatus::Pending));
    assert_eq!(step.status, StepStatus::Completed);
}

// ---------------------------------------------------------------------------
// Review results
// ---------------------------------------------------------------------------

#[test]
fn clean_and_unparsed_are_distinguishable() {
    let clean = CodeReviewResult::clean(ReviewAspect::Security);
    let unparsed = CodeReviewResult::unparsed(ReviewAspect::Security, "looks fine");

    assert!(!clean.has_issues);
    assert!(!unparsed.has_issues);
    assert_eq!(clean.outcome, ReviewOutcome::Clean);
    assert_eq!(
        unparsed.outcome,
        ReviewOutcome::Unparsed {
            raw_preview: "looks fine".into()
        }
    );
    assert_eq!(clean.issues, vec!["No security issues detected"]);
    assert_eq!(unparsed.issues, vec!["No specific issues detected"]);
}

#[test]
fn unparsed_preview_is_bounded() {
    let raw = "x".repeat(1000);
    let result = CodeReviewResult::unparsed(ReviewAspect::Bug, &raw);
    match result.outcome {
        ReviewOutcome::Unparsed { raw_preview } => assert_eq!(raw_preview.len(), RAW_PREVIEW_CHARS),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn failed_result_guides_the_user() {
    let result = CodeReviewResult::failed(ReviewAspect::Clarity, "boom");
    assert!(result.has_issues);
    assert!(result.is_failed());
    assert_eq!(result.issues, vec!["API call failed: boom"]);
    assert_eq!(result.recommendations, vec!["Check API key and network connection"]);
    assert_eq!(result.steps.len(), 3);
}

#[test]
fn aspect_parses_from_cli_text() {
    assert_eq!("Security".parse::<ReviewAspect>(), Ok(ReviewAspect::Security));
    assert_eq!("perf".parse::<ReviewAspect>(), Ok(ReviewAspect::Performance));
    assert!("style".parse::<ReviewAspect>().is_err());
    assert_eq!(ReviewAspect::ALL[0], ReviewAspect::Bug);
    assert_eq!(ReviewAspect::ALL[3], ReviewAspect::Clarity);
}
