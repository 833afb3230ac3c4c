//! Extraction of structured sections from free-form model replies.
//!
//! Every function here is total: malformed or partial input degrades to
//! empty sections rather than an error, so one missing section never
//! contaminates its siblings.

use serde::{Deserialize, Serialize};

use crate::types::PlanStep;

/// Phrases a reviewer uses to say "nothing to report". Bullet lines
/// containing any of these are not counted as findings.
pub const NO_FINDINGS_SENTINELS: &[&str] = &[
    "No issues detected",
    "No bugs detected",
    "No performance issues detected",
    "No security issues detected",
    "No clarity issues detected",
    "No specific issues detected",
    "No recommendations needed",
    "No action required",
];

// ---------------------------------------------------------------------------
// Marker sections
// ---------------------------------------------------------------------------

/// Return the trimmed text between `{name}_START` and the next `{name}_END`.
///
/// Returns an empty string when either marker is missing.
pub fn extract_marked_section(text: &str, name: &str) -> String {
    let start_marker = format!("{name}_START");
    let end_marker = format!("{name}_END");

    let Some(start) = text.find(&start_marker) else {
        return String::new();
    };
    let body_start = start + start_marker.len();
    match text[body_start..].find(&end_marker) {
        Some(len) => text[body_start..body_start + len].trim().to_string(),
        None => String::new(),
    }
}

/// Reply to an implementation request, split into its three marked parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub plan: Vec<PlanStep>,
    pub explanation: String,
    pub new_code: String,
}

/// Parse a `PLAN_START`/`EXPLANATION_START`/`NEW_CODE_START` reply.
///
/// Plan lines are the non-empty lines of the plan section with any leading
/// `<n>.` removed, renumbered from 1.
pub fn parse_generation_response(raw: &str) -> GenerationResponse {
    let plan = extract_marked_section(raw, "PLAN")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let description = strip_list_number(line).unwrap_or(line);
            PlanStep::new(index as u32 + 1, description.trim())
        })
        .collect();

    GenerationResponse {
        plan,
        explanation: extract_marked_section(raw, "EXPLANATION"),
        new_code: extract_marked_section(raw, "NEW_CODE"),
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// If `line` starts with `<digits>.`, return what follows (left-trimmed).
fn strip_list_number(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix('.').map(str::trim_start)
}

/// Collect the lines of `text` that begin with `<n>.`, prefix removed.
pub fn extract_numbered_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(strip_list_number)
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Derive plan steps from the `### Step <n>: <title>` headings of a
/// markdown plan. Steps are numbered by position, starting at 1.
pub fn extract_plan_steps(detailed_plan: &str) -> Vec<PlanStep> {
    detailed_plan
        .lines()
        .filter_map(step_heading_title)
        .enumerate()
        .map(|(index, title)| PlanStep::new(index as u32 + 1, title))
        .collect()
}

fn step_heading_title(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("### Step")?.trim_start();
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    rest[digits..].strip_prefix(':').map(str::trim)
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// Remove a leading ```` ```lang ```` fence line and a trailing ```` ``` ````.
pub fn strip_code_fence(code: &str) -> String {
    let mut body = code.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let lang_len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#'))
            .count();
        let rest = &rest[lang_len..];
        body = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')).unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim().to_string()
}

// ---------------------------------------------------------------------------
// Review sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewSection {
    None,
    Issues,
    Recommendations,
    Steps,
}

/// Bulleted `ISSUES:` / `RECOMMENDATIONS:` / `STEPS:` lists from a review reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSections {
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub steps: Vec<String>,
    /// Number of section header lines recognised while scanning.
    pub headers_seen: usize,
}

impl ReviewSections {
    /// Scan `raw` line by line. A header line switches the current section;
    /// a `-` line is appended to it unless empty or a "no findings" phrase;
    /// anything else is ignored.
    pub fn parse(raw: &str) -> Self {
        let mut sections = Self::default();
        let mut current = ReviewSection::None;

        for line in raw.lines() {
            let trimmed = line.trim();
            let header = match trimmed {
                "ISSUES:" => Some(ReviewSection::Issues),
                "RECOMMENDATIONS:" => Some(ReviewSection::Recommendations),
                "STEPS:" => Some(ReviewSection::Steps),
                _ => None,
            };
            if let Some(section) = header {
                current = section;
                sections.headers_seen += 1;
                continue;
            }

            let Some(item) = trimmed.strip_prefix('-') else {
                continue;
            };
            let item = item.trim();
            if item.is_empty() || is_no_findings(item) {
                continue;
            }
            let target = match current {
                ReviewSection::None => continue,
                ReviewSection::Issues => &mut sections.issues,
                ReviewSection::Recommendations => &mut sections.recommendations,
                ReviewSection::Steps => &mut sections.steps,
            };
            target.push(item.to_string());
        }

        sections
    }

    /// `true` when no finding was accumulated in any section.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.recommendations.is_empty() && self.steps.is_empty()
    }

    /// `true` when the reply had at least one recognised header.
    pub fn is_structured(&self) -> bool {
        self.headers_seen > 0
    }
}

fn is_no_findings(item: &str) -> bool {
    NO_FINDINGS_SENTINELS
        .iter()
        .any(|sentinel| item.contains(sentinel))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_list_number() {
        assert_eq!(strip_list_number("1. first"), Some("first"));
        assert_eq!(strip_list_number("  12.second"), Some("second"));
        assert_eq!(strip_list_number("1) nope"), None);
        assert_eq!(strip_list_number("- bullet"), None);
    }

    #[test]
    fn test_step_heading_title() {
        assert_eq!(step_heading_title("### Step 3: Wire it up"), Some("Wire it up"));
        assert_eq!(step_heading_title("   ### Step 10:   Spaced  "), Some("Spaced"));
        assert_eq!(step_heading_title("## Step 1: Wrong level"), None);
        assert_eq!(step_heading_title("### Step: Missing number"), None);
    }

    #[test]
    fn test_marker_without_end_is_empty() {
        assert_eq!(extract_marked_section("PLAN_START\n1. a\n", "PLAN"), "");
    }
}
