use std::path::Path;

use anyhow::Context;
use sc_core::config::Config;
use sc_core::types::{CodeReviewResult, ReviewAspect, ReviewOutcome};

use super::{api_key, assistant, read_source};

/// Run the `review` subcommand.
///
/// Prints all four aspect results. With `fix`, the named aspect's findings
/// are handed back to the model and the generated code is printed.
pub async fn run(
    config: &Config,
    file: &Path,
    json: bool,
    fix: Option<&str>,
) -> anyhow::Result<()> {
    let fix_aspect = fix
        .map(|s| s.parse::<ReviewAspect>().map_err(anyhow::Error::msg))
        .transpose()?;
    let key = api_key(config)?;
    let code = read_source(file)?;
    let file_name = file.display().to_string();
    let assistant = assistant(config)?;

    let results = assistant
        .run_code_review(&code, &file_name, &key)
        .await
        .context("code review failed")?;

    let fixed = match fix_aspect {
        Some(aspect) => {
            let target = results
                .iter()
                .find(|r| r.aspect == aspect)
                .with_context(|| format!("no review result for {aspect}"))?;
            if !target.has_issues {
                println!("{aspect}: nothing to fix");
                None
            } else {
                Some(
                    assistant
                        .implement_review_fix(&code, &file_name, target, &key)
                        .await
                        .context("fix generation failed")?,
                )
            }
        }
        None => None,
    };

    if json {
        let out = serde_json::json!({ "results": results, "fix": fixed });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for result in &results {
        print_result(result);
    }
    if let Some(code) = fixed.as_ref().and_then(|r| r.generated_code.as_deref()) {
        println!("\n== Suggested fix ==\n{code}");
    }
    Ok(())
}

fn print_result(result: &CodeReviewResult) {
    let status = match &result.outcome {
        ReviewOutcome::IssuesFound => "issues found",
        ReviewOutcome::Clean => "clean",
        ReviewOutcome::Unparsed { .. } => "unparsed reply",
        ReviewOutcome::Failed { .. } => "failed",
    };
    println!("\n== {} ({status}) ==", result.aspect.title());
    print_list("Issues", &result.issues);
    print_list("Recommendations", &result.recommendations);
    print_list("Steps", &result.steps);
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{label}:");
    for item in items {
        println!("  - {item}");
    }
}
