use std::path::Path;

use anyhow::Context;
use sc_agents::implementation::plan_steps;
use sc_agents::{CodeAssistant, StageSink};
use sc_core::config::Config;
use sc_core::types::{AgentResponse, StageKind, StageUpdate};
use sc_intelligence::ApiKey;

use super::{api_key, assistant, read_source};

/// Run the `plan` subcommand.
///
/// Stage updates stream to stdout as they arrive unless `json` is set, in
/// which case only the final response is printed. With `apply` the
/// generated implementation replaces the contents of `file`.
pub async fn run(
    config: &Config,
    file: &Path,
    instruction: &str,
    apply: bool,
    json: bool,
) -> anyhow::Result<()> {
    let key = api_key(config)?;
    let code = read_source(file)?;
    let file_name = file.display().to_string();
    let assistant = assistant(config)?;

    let print_update = |update: StageUpdate| render_update(&update);
    let sink = if json {
        None
    } else {
        Some(&print_update as &dyn StageSink)
    };

    let response = assistant
        .run_pipeline(&code, instruction, &file_name, &key, sink)
        .await
        .context("pipeline failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if response.is_degraded() {
        let stages: Vec<String> = response.degraded_stages.iter().map(|s| s.to_string()).collect();
        println!("\nwarning: degraded stages: {}", stages.join(", "));
    }

    if apply {
        apply_plan(&assistant, &response, &code, instruction, file, &key, json).await?;
    }
    Ok(())
}

async fn apply_plan(
    assistant: &CodeAssistant,
    response: &AgentResponse,
    code: &str,
    instruction: &str,
    file: &Path,
    key: &ApiKey,
    json: bool,
) -> anyhow::Result<()> {
    let steps = plan_steps(response)?;
    let file_name = file.display().to_string();
    let implementation = assistant
        .generate_implementation(code, instruction, &file_name, &steps, key)
        .await
        .context("implementation failed")?;

    std::fs::write(file, &implementation.new_code)
        .with_context(|| format!("failed to write {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&implementation)?);
    } else {
        println!("\n== Implementation ==");
        if !implementation.explanation.is_empty() {
            println!("{}", implementation.explanation);
        }
        println!("wrote {} ({} steps)", file.display(), implementation.plan.len());
    }
    Ok(())
}

fn render_update(update: &StageUpdate) {
    if !update.is_complete {
        println!("... {}", update.content);
        return;
    }
    if update.degraded {
        println!("\n== {} (degraded) ==", heading(update.kind));
    } else {
        println!("\n== {} ==", heading(update.kind));
    }
    match &update.points {
        Some(points) => {
            for (i, point) in points.iter().enumerate() {
                println!("{}. {point}", i + 1);
            }
        }
        None => println!("{}", update.content),
    }
}

fn heading(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Thinking => "Analysis",
        StageKind::Observations => "Observations",
        StageKind::Approach => "Approach",
        StageKind::Plan => "Plan",
    }
}
