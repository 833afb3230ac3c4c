//! Prompt builders for every model call the agents make.
//!
//! Each builder is a pure function of its inputs so prompts can be asserted
//! on in tests without a provider.

use sc_core::types::{CodeReviewResult, ContextGatheringResult, PlanStep, ReviewAspect};

use crate::stages::StageInput;

/// Appended to review input cut at the length limit.
pub const TRUNCATION_NOTICE: &str = "\n\n[Code truncated for analysis due to length]";

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bulleted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Explanation stages
// ---------------------------------------------------------------------------

/// One round of the context-gathering loop. `iteration` is 0-based.
pub fn thinking_iteration(
    input: &StageInput<'_>,
    context: &ContextGatheringResult,
    iteration: u32,
    structure_preview_chars: usize,
    dependency_preview_chars: usize,
) -> String {
    format!(
        "You are an expert code analyst performing iteration {iteration} of context gathering.

Current Context:
- Project Structure: {structure}...
- Relevant Files Found: {files} files
- Existing Variables: {variables} patterns found
- Dependencies: {dependencies}...

User Request: {instruction}
File: {file_name}
Current Code:
{code}

Task: Analyze the current context and determine:
1. What additional information would be most valuable to gather?
2. Are there any obvious gaps in our understanding?
3. What specific questions should we ask about the codebase?

Think step by step and provide clear reasoning for what context we still need.",
        iteration = iteration + 1,
        structure = preview(&context.project_structure, structure_preview_chars),
        files = context.relevant_files.len(),
        variables = context.existing_variables.len(),
        dependencies = preview(&context.dependencies, dependency_preview_chars),
        instruction = input.instruction,
        file_name = input.file_name,
        code = input.code,
    )
}

pub fn observations(input: &StageInput<'_>, thinking: &str) -> String {
    format!(
        "You are an expert code reviewer. Based on the intelligent analysis, provide key observations:

File: {file_name}
User Request: {instruction}
Current Code:
{code}

Intelligent Analysis Result:
{thinking}

Task: Generate 3-5 key observations about the current state and what needs to be improved. Focus on:
- Code structure and organization
- Missing functionality
- Potential improvements
- Areas of concern
- How to avoid duplicating existing code

Respond with ONLY a numbered list of observations, one per line.",
        file_name = input.file_name,
        instruction = input.instruction,
        code = input.code,
    )
}

pub fn approach(input: &StageInput<'_>, thinking: &str, observations: &[String]) -> String {
    format!(
        "You are an expert software architect. Based on the intelligent analysis and observations, define the approach:

File: {file_name}
User Request: {instruction}
Current Code:
{code}

Intelligent Analysis Result:
{thinking}

Key Observations:
{observations}

Task: Define a high-level approach that addresses the observations and achieves the user's goal. Include:
- Overall strategy
- Key principles
- Design considerations
- Success criteria
- How to leverage existing code and avoid duplication

Respond with ONLY the approach description in clear, structured paragraphs.",
        file_name = input.file_name,
        instruction = input.instruction,
        code = input.code,
        observations = numbered(observations),
    )
}

pub fn planning(input: &StageInput<'_>, thinking: &str, approach: &str) -> String {
    format!(
        "You are an expert software engineer. Create a detailed implementation plan. Do not give the full code itself. The plan must only cover changes to the single file the user asked about:

File: {file_name}
User Request: {instruction}
Current Code:
{code}

Intelligent Analysis Result:
{thinking}

Approach: {approach}

Task: Create a detailed, step-by-step implementation plan. Give only the implementation plan; do not include questions for the user. Structure it as:

# Implementation Plan

## Phase 1: [Phase Name]
### Step 1: [Step Title]
- **Action**: [What to do]
- **Details**: [How to do it]
- **Expected Outcome**: [What should happen]

### Step 2: [Step Title]
- **Action**: [What to do]
- **Details**: [How to do it]
- **Expected Outcome**: [What should happen]

## Phase 2: [Phase Name]
[Continue with more phases and steps...]

Ensure each step is actionable, specific, and builds upon previous steps. Consider the existing codebase context to avoid duplication. The plan should be clear enough for a model to generate the exact same output from it.",
        file_name = input.file_name,
        instruction = input.instruction,
        code = input.code,
    )
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

const GENERATION_FORMAT: &str = "Respond in this exact format:

PLAN_START
1. [First step description]
2. [Second step description]
...
PLAN_END

EXPLANATION_START
[Detailed explanation of what you changed and why]
EXPLANATION_END

NEW_CODE_START
[Complete new/modified code here]
NEW_CODE_END

Make sure the new code is complete and functional.";

/// Ask for the complete rewritten file that carries out `steps`.
pub fn implementation(input: &StageInput<'_>, steps: &[PlanStep]) -> String {
    let plan = steps
        .iter()
        .map(|s| format!("{}. {}", s.step, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are an AI code assistant. The user wants to: \"{instruction}\"

File: {file_name}
Current Code:
{code}

Implement the following plan, step by step:
{plan}

{GENERATION_FORMAT}",
        instruction = input.instruction,
        file_name = input.file_name,
        code = input.code,
    )
}

/// Ask for a rewrite of `code` that resolves the findings in `result`.
pub fn review_fix(code: &str, file_name: &str, result: &CodeReviewResult) -> String {
    format!(
        "You are an AI code assistant. A {aspect} review of the file below reported these findings.

File: {file_name}
Current Code:
{code}

ISSUES:
{issues}

RECOMMENDATIONS:
{recommendations}

STEPS:
{steps}

Rewrite the code so that every issue is resolved, following the recommendations and steps. Keep unrelated behaviour unchanged.

{GENERATION_FORMAT}",
        aspect = result.aspect,
        issues = bulleted(&result.issues),
        recommendations = bulleted(&result.recommendations),
        steps = bulleted(&result.steps),
    )
}

// ---------------------------------------------------------------------------
// Code review
// ---------------------------------------------------------------------------

struct AspectPrompt {
    persona: &'static str,
    goal: &'static str,
    focus: &'static [&'static str],
    noun: &'static str,
    action: &'static str,
}

fn aspect_prompt(aspect: ReviewAspect) -> AspectPrompt {
    match aspect {
        ReviewAspect::Bug => AspectPrompt {
            persona: "You are a code review expert.",
            goal: "existing bugs and errors",
            focus: &[
                "Logic errors",
                "Edge cases not handled",
                "Type mismatches",
                "Null/undefined access",
                "Array bounds issues",
                "Exception handling",
                "Syntax errors",
            ],
            noun: "issues",
            action: "fix issues",
        },
        ReviewAspect::Performance => AspectPrompt {
            persona: "You are a performance optimization expert.",
            goal: "performance optimization opportunities",
            focus: &[
                "Algorithm efficiency",
                "Memory usage",
                "Loop optimizations",
                "Database query efficiency",
                "Caching opportunities",
                "Async/await usage",
            ],
            noun: "performance issues",
            action: "improve performance",
        },
        ReviewAspect::Security => AspectPrompt {
            persona: "You are a security expert.",
            goal: "security vulnerabilities",
            focus: &[
                "Input validation",
                "SQL injection",
                "XSS vulnerabilities",
                "Authentication/authorization",
                "Data encryption",
                "Secure coding practices",
            ],
            noun: "security issues",
            action: "improve security",
        },
        ReviewAspect::Clarity => AspectPrompt {
            persona: "You are a code quality expert.",
            goal: "clarity and maintainability improvements",
            focus: &[
                "Code readability",
                "Variable naming",
                "Function complexity",
                "Documentation",
                "Code organization",
                "Best practices",
            ],
            noun: "clarity issues",
            action: "improve clarity",
        },
    }
}

/// Fixed-format review request for one aspect. `code` is expected to be
/// truncated already.
pub fn review(aspect: ReviewAspect, code: &str, file_name: &str) -> String {
    let p = aspect_prompt(aspect);
    let focus = p
        .focus
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{persona} Analyze the following code for {goal}.

Code to review:
```{file_name}
{code}
```

Focus on:
{focus}

Provide your analysis in EXACTLY this format (do not deviate):

ISSUES:
- [List specific {noun} found, one per line starting with dash]

RECOMMENDATIONS:
- [List specific recommendations to {action}, one per line starting with dash]

STEPS:
- [List step-by-step actions to resolve them, one per line starting with dash]

If no issues are found, respond with:
ISSUES:
- {clean}

RECOMMENDATIONS:
- No recommendations needed

STEPS:
- No action required",
        persona = p.persona,
        goal = p.goal,
        noun = p.noun,
        action = p.action,
        clean = aspect.clean_phrase(),
    )
}
