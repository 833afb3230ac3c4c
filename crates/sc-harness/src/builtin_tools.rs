use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::project::{read_text, ProjectRoot};
use crate::tools::{parse_params, run_blocking, InspectionTool, ToolError, ToolOutput};

// ---------------------------------------------------------------------------
// Built-in inspection tools
//
// search, describe_file, describe_project, find_identifier,
// describe_dependencies.
// ---------------------------------------------------------------------------

pub const SEARCH: &str = "search";
pub const DESCRIBE_FILE: &str = "describe_file";
pub const DESCRIBE_PROJECT: &str = "describe_project";
pub const FIND_IDENTIFIER: &str = "find_identifier";
pub const DESCRIBE_DEPENDENCIES: &str = "describe_dependencies";

const MAX_SEARCH_FILES: usize = 500;
const MAX_SEARCH_HITS: usize = 20;
const SEARCH_CONTEXT_LINES: usize = 2;

const MAX_IDENTIFIER_FILES: usize = 100;
const MAX_IDENTIFIER_SITES: usize = 15;
const IDENTIFIER_CONTEXT_LINES: usize = 1;

const CONTENT_PREVIEW_LINES: usize = 20;
const MAX_TREE_LINES: usize = 400;

/// All built-in tools, sharing one project root.
pub fn builtin_tools(project: Arc<ProjectRoot>) -> Vec<Arc<dyn InspectionTool>> {
    vec![
        Arc::new(SearchTool::new(project.clone())),
        Arc::new(DescribeFileTool::new(project.clone())),
        Arc::new(DescribeProjectTool::new(project.clone())),
        Arc::new(FindIdentifierTool::new(project.clone())),
        Arc::new(DescribeDependenciesTool::new(project)),
    ]
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Structure,
    Content,
    Dependencies,
    Variables,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeFileParams {
    pub file_path: String,
    pub analysis_type: AnalysisType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanDepth {
    Shallow,
    Medium,
    Deep,
}

impl ScanDepth {
    pub fn max_levels(&self) -> usize {
        match self {
            ScanDepth::Shallow => 2,
            ScanDepth::Medium => 3,
            ScanDepth::Deep => 4,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScanDepth::Shallow => "shallow",
            ScanDepth::Medium => "medium",
            ScanDepth::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeProjectParams {
    pub depth: ScanDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierScope {
    CurrentFile,
    ProjectWide,
    SpecificDirectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindIdentifierParams {
    pub name: String,
    pub scope: IdentifierScope,
    /// Required for `current_file`.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Directory for `specific_directory`; defaults to `src`.
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeDependenciesParams {
    pub file_path: String,
    #[serde(default)]
    pub include_dev: bool,
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

pub struct SearchTool {
    project: Arc<ProjectRoot>,
}

impl SearchTool {
    pub fn new(project: Arc<ProjectRoot>) -> Self {
        Self { project }
    }
}

#[async_trait]
impl InspectionTool for SearchTool {
    fn name(&self) -> &str {
        SEARCH
    }

    fn description(&self) -> &str {
        "Search the codebase for files containing a term (case-insensitive). \
         Reports the first matching line of each file with surrounding lines."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to look for" },
                "context": { "type": "string", "description": "Optional note on why the term matters" }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: SearchParams = parse_params(SEARCH, params)?;
        if params.query.trim().is_empty() {
            return Err(ToolError::invalid_params(SEARCH, "query must not be empty"));
        }
        let project = self.project.clone();
        run_blocking(move || Ok(search(&project, &params))).await
    }
}

fn search(project: &ProjectRoot, params: &SearchParams) -> ToolOutput {
    let query = params.query.trim();
    if !project.exists() {
        return missing_root(project);
    }

    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    for path in project.source_files(None).take(MAX_SEARCH_FILES) {
        let Some(text) = read_text(&path) else {
            continue;
        };
        let lines: Vec<&str> = text.lines().collect();
        let Some(index) = lines
            .iter()
            .position(|line| line.to_lowercase().contains(&needle))
        else {
            continue;
        };

        let start = index.saturating_sub(SEARCH_CONTEXT_LINES);
        let end = (index + SEARCH_CONTEXT_LINES + 1).min(lines.len());
        hits.push(format!(
            "Found in {}\n  Lines {}-{}: {}",
            project.relative(&path),
            start + 1,
            end,
            lines[start..end].join(" | ")
        ));
        if hits.len() >= MAX_SEARCH_HITS {
            break;
        }
    }

    if hits.is_empty() {
        return ToolOutput::nothing(format!(
            "No files found containing \"{query}\". Try a different search term or check the project root."
        ));
    }

    let header = match params.context.as_deref().map(str::trim) {
        Some(context) if !context.is_empty() => {
            format!("Search results for \"{query}\" ({context}):")
        }
        _ => format!("Search results for \"{query}\":"),
    };
    ToolOutput::found(format!("{header}\n{}", hits.join("\n")))
}

// ---------------------------------------------------------------------------
// describe_file
// ---------------------------------------------------------------------------

pub struct DescribeFileTool {
    project: Arc<ProjectRoot>,
}

impl DescribeFileTool {
    pub fn new(project: Arc<ProjectRoot>) -> Self {
        Self { project }
    }
}

#[async_trait]
impl InspectionTool for DescribeFileTool {
    fn name(&self) -> &str {
        DESCRIBE_FILE
    }

    fn description(&self) -> &str {
        "Describe a single file: line statistics, a content preview, its import/export \
         lines, or the variable names it declares."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": { "type": "string", "description": "Path relative to the project root" },
                "analysisType": {
                    "type": "string",
                    "enum": ["structure", "content", "dependencies", "variables"]
                }
            },
            "required": ["filePath", "analysisType"]
        })
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: DescribeFileParams = parse_params(DESCRIBE_FILE, params)?;
        let project = self.project.clone();
        run_blocking(move || describe_file(&project, &params)).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileStructure {
    total_lines: usize,
    empty_lines: usize,
    comment_lines: usize,
    import_lines: usize,
    function_lines: usize,
}

fn is_comment_line(line: &str) -> bool {
    ["//", "/*", "*", "#"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        && !line.starts_with("#[")
        && !line.starts_with("#include")
}

fn is_import_line(line: &str) -> bool {
    ["import ", "export ", "use ", "pub use ", "from ", "#include", "mod ", "pub mod "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
        || line.contains("require(")
}

fn is_function_line(line: &str) -> bool {
    ["fn ", "function", "=>", "class ", "def "]
        .iter()
        .any(|marker| line.contains(marker))
}

fn describe_file(project: &ProjectRoot, params: &DescribeFileParams) -> Result<ToolOutput, ToolError> {
    let file_path = &params.file_path;
    let path = project.resolve(file_path);
    if !path.is_file() {
        return Ok(ToolOutput::nothing(format!("File not found: {file_path}")));
    }
    let Some(text) = read_text(&path) else {
        return Ok(ToolOutput::nothing(format!(
            "File is not readable as text: {file_path}"
        )));
    };
    let lines: Vec<&str> = text.lines().collect();

    let output = match params.analysis_type {
        AnalysisType::Structure => {
            let trimmed: Vec<&str> = lines.iter().map(|l| l.trim()).collect();
            let structure = FileStructure {
                total_lines: lines.len(),
                empty_lines: trimmed.iter().filter(|l| l.is_empty()).count(),
                comment_lines: trimmed.iter().filter(|l| is_comment_line(l)).count(),
                import_lines: trimmed.iter().filter(|l| is_import_line(l)).count(),
                function_lines: trimmed.iter().filter(|l| is_function_line(l)).count(),
            };
            let body = serde_json::to_string_pretty(&structure)
                .map_err(|e| ToolError::Internal(e.to_string()))?;
            ToolOutput::found(format!("File structure analysis for {file_path}:\n{body}"))
        }
        AnalysisType::Content => {
            let preview = lines
                .iter()
                .take(CONTENT_PREVIEW_LINES)
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            ToolOutput::found(format!(
                "Content preview for {file_path} (first {CONTENT_PREVIEW_LINES} lines):\n{preview}"
            ))
        }
        AnalysisType::Dependencies => {
            let imports: Vec<&str> = lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| is_import_line(l))
                .collect();
            if imports.is_empty() {
                ToolOutput::nothing(format!("No import or export lines in {file_path}"))
            } else {
                ToolOutput::found(format!(
                    "Dependencies and exports in {file_path}:\n{}",
                    imports.join("\n")
                ))
            }
        }
        AnalysisType::Variables => {
            let pattern = Regex::new(
                r"\b(?:const|let|var|static)\s+(?:mut\s+)?([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=;]*)?=",
            )
            .map_err(|e| ToolError::Internal(e.to_string()))?;
            let variables: Vec<&str> = pattern
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect();
            if variables.is_empty() {
                ToolOutput::nothing(format!("No variable declarations found in {file_path}"))
            } else {
                ToolOutput::found(format!(
                    "Variables found in {file_path}:\n{}",
                    variables.join(", ")
                ))
            }
        }
    };
    Ok(output)
}

// ---------------------------------------------------------------------------
// describe_project
// ---------------------------------------------------------------------------

pub struct DescribeProjectTool {
    project: Arc<ProjectRoot>,
}

impl DescribeProjectTool {
    pub fn new(project: Arc<ProjectRoot>) -> Self {
        Self { project }
    }
}

#[async_trait]
impl InspectionTool for DescribeProjectTool {
    fn name(&self) -> &str {
        DESCRIBE_PROJECT
    }

    fn description(&self) -> &str {
        "Render the directory layout of the project as an indented tree, \
         two, three or four levels deep."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "depth": { "type": "string", "enum": ["shallow", "medium", "deep"] }
            },
            "required": ["depth"]
        })
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: DescribeProjectParams = parse_params(DESCRIBE_PROJECT, params)?;
        let project = self.project.clone();
        run_blocking(move || Ok(describe_project(&project, params.depth))).await
    }
}

fn describe_project(project: &ProjectRoot, depth: ScanDepth) -> ToolOutput {
    if !project.exists() {
        return missing_root(project);
    }

    let max_levels = depth.max_levels();
    let mut lines = Vec::new();
    let mut truncated = false;
    for entry in project.entries(max_levels) {
        if lines.len() >= MAX_TREE_LINES {
            truncated = true;
            break;
        }
        let indent = "  ".repeat(entry.depth() - 1);
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            if entry.depth() == max_levels {
                let count = std::fs::read_dir(entry.path())
                    .map(|entries| entries.count())
                    .unwrap_or(0);
                lines.push(format!("{indent}{name}/ [{count} items]"));
            } else {
                lines.push(format!("{indent}{name}/"));
            }
        } else {
            lines.push(format!("{indent}{name}"));
        }
    }

    let header = format!("Project structure ({} depth):", depth.label());
    if lines.is_empty() {
        return ToolOutput::nothing(format!("{header}\n(project is empty)"));
    }
    if truncated {
        lines.push(format!("... (truncated after {MAX_TREE_LINES} entries)"));
    }
    ToolOutput::found(format!("{header}\n{}", lines.join("\n")))
}

// ---------------------------------------------------------------------------
// find_identifier
// ---------------------------------------------------------------------------

pub struct FindIdentifierTool {
    project: Arc<ProjectRoot>,
}

impl FindIdentifierTool {
    pub fn new(project: Arc<ProjectRoot>) -> Self {
        Self { project }
    }
}

#[async_trait]
impl InspectionTool for FindIdentifierTool {
    fn name(&self) -> &str {
        FIND_IDENTIFIER
    }

    fn description(&self) -> &str {
        "Find where an identifier is declared or used, in one file, one directory \
         or across the project."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Identifier to look for" },
                "scope": {
                    "type": "string",
                    "enum": ["current_file", "project_wide", "specific_directory"]
                },
                "filePath": { "type": "string", "description": "File searched when scope is current_file" },
                "directory": { "type": "string", "description": "Directory searched when scope is specific_directory (default: src)" }
            },
            "required": ["name", "scope"]
        })
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: FindIdentifierParams = parse_params(FIND_IDENTIFIER, params)?;
        let name = params.name.trim();
        // Word characters only; the usage pattern is bounded by `\b`.
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ToolError::invalid_params(
                FIND_IDENTIFIER,
                format!("not an identifier: {:?}", params.name),
            ));
        }
        if params.scope == IdentifierScope::CurrentFile && params.file_path.is_none() {
            return Err(ToolError::invalid_params(
                FIND_IDENTIFIER,
                "filePath is required when scope is current_file",
            ));
        }
        let project = self.project.clone();
        run_blocking(move || find_identifier(&project, &params)).await
    }
}

fn find_identifier(
    project: &ProjectRoot,
    params: &FindIdentifierParams,
) -> Result<ToolOutput, ToolError> {
    let name = params.name.trim();
    let escaped = regex::escape(name);
    let usage = Regex::new(&format!(r"\b{escaped}\b"))
        .map_err(|e| ToolError::Internal(e.to_string()))?;
    let declaration = Regex::new(&format!(
        r"\b(?:const|let|var|static|fn|function|class|struct|enum|trait|type|def)\s+(?:mut\s+)?{escaped}\b"
    ))
    .map_err(|e| ToolError::Internal(e.to_string()))?;

    let files: Vec<std::path::PathBuf> = match params.scope {
        IdentifierScope::CurrentFile => {
            let path = project.resolve(params.file_path.as_deref().unwrap_or_default());
            if !path.is_file() {
                return Ok(ToolOutput::nothing(format!(
                    "File not found: {}",
                    params.file_path.as_deref().unwrap_or_default()
                )));
            }
            vec![path]
        }
        IdentifierScope::ProjectWide => project
            .source_files(None)
            .take(MAX_IDENTIFIER_FILES)
            .collect(),
        IdentifierScope::SpecificDirectory => {
            let dir = project.resolve(params.directory.as_deref().unwrap_or("src"));
            if !dir.is_dir() {
                return Ok(ToolOutput::nothing(format!(
                    "Directory not found: {}",
                    project.relative(&dir)
                )));
            }
            project
                .source_files(Some(&dir))
                .take(MAX_IDENTIFIER_FILES)
                .collect()
        }
    };

    let mut sites = Vec::new();
    for path in &files {
        let Some(text) = read_text(path) else {
            continue;
        };
        let lines: Vec<&str> = text.lines().collect();
        let Some(index) = lines
            .iter()
            .position(|line| declaration.is_match(line))
            .or_else(|| lines.iter().position(|line| usage.is_match(line)))
        else {
            continue;
        };

        let kind = if declaration.is_match(lines[index]) {
            "declaration"
        } else {
            "usage"
        };
        let start = index.saturating_sub(IDENTIFIER_CONTEXT_LINES);
        let end = (index + IDENTIFIER_CONTEXT_LINES + 1).min(lines.len());
        sites.push(format!(
            "{}:{} ({kind})\n  {}",
            project.relative(path),
            index + 1,
            lines[start..end].join("\n  ")
        ));
        if sites.len() >= MAX_IDENTIFIER_SITES {
            break;
        }
    }

    if sites.is_empty() {
        return Ok(ToolOutput::nothing(format!(
            "Identifier \"{name}\" not found in the specified scope."
        )));
    }
    Ok(ToolOutput::found(format!(
        "Identifier \"{name}\" found in:\n{}",
        sites.join("\n\n")
    )))
}

// ---------------------------------------------------------------------------
// describe_dependencies
// ---------------------------------------------------------------------------

pub struct DescribeDependenciesTool {
    project: Arc<ProjectRoot>,
}

impl DescribeDependenciesTool {
    pub fn new(project: Arc<ProjectRoot>) -> Self {
        Self { project }
    }
}

#[async_trait]
impl InspectionTool for DescribeDependenciesTool {
    fn name(&self) -> &str {
        DESCRIBE_DEPENDENCIES
    }

    fn description(&self) -> &str {
        "List a file's imports and exports together with the dependencies declared \
         in the project manifest (package.json or Cargo.toml)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": { "type": "string" },
                "includeDev": { "type": "boolean", "description": "Also list development dependencies" }
            },
            "required": ["filePath"]
        })
    }

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: DescribeDependenciesParams = parse_params(DESCRIBE_DEPENDENCIES, params)?;
        let project = self.project.clone();
        run_blocking(move || describe_dependencies(&project, &params)).await
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDependencies {
    manifest: String,
    dependencies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    dev_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DependencyReport {
    file: String,
    dependencies: Vec<String>,
    exports: Vec<String>,
    project_dependencies: Vec<ManifestDependencies>,
}

struct ImportPatterns {
    imports: Vec<Regex>,
    exports: Vec<Regex>,
}

impl ImportPatterns {
    fn compile() -> Result<Self, ToolError> {
        let build = |patterns: &[&str]| -> Result<Vec<Regex>, ToolError> {
            patterns
                .iter()
                .map(|p| Regex::new(p).map_err(|e| ToolError::Internal(e.to_string())))
                .collect()
        };
        Ok(Self {
            imports: build(&[
                r#"^import\s+(?:.*?\s+from\s+)?['"]([^'"]+)['"]"#,
                r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
                r"^(?:pub\s+)?use\s+([A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)",
                r"^from\s+([\w.]+)\s+import\b",
                r"^import\s+([\w.]+)\s*$",
            ])?,
            exports: build(&[
                r"^export\s+(?:default\s+)?(?:async\s+)?(?:function\*?|class|const|let|var|interface|type|enum)?\s*([A-Za-z_$][\w$]*)",
                r"^pub\s+(?:async\s+)?(?:fn|struct|enum|trait|mod|const|static|type)\s+([A-Za-z_]\w*)",
            ])?,
        })
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

fn describe_dependencies(
    project: &ProjectRoot,
    params: &DescribeDependenciesParams,
) -> Result<ToolOutput, ToolError> {
    let file_path = &params.file_path;
    let path = project.resolve(file_path);
    let Some(text) = read_text(&path) else {
        return Ok(ToolOutput::nothing(format!("File not found: {file_path}")));
    };

    let patterns = ImportPatterns::compile()?;
    let mut dependencies = Vec::new();
    let mut exports = Vec::new();
    for line in text.lines().map(str::trim) {
        for pattern in &patterns.imports {
            if let Some(m) = pattern.captures(line).and_then(|caps| caps.get(1)) {
                push_unique(&mut dependencies, m.as_str());
            }
        }
        for pattern in &patterns.exports {
            if let Some(m) = pattern.captures(line).and_then(|caps| caps.get(1)) {
                push_unique(&mut exports, m.as_str());
            }
        }
    }

    let mut project_dependencies = Vec::new();
    if let Some(manifest) = read_package_json(project.path(), params.include_dev) {
        project_dependencies.push(manifest);
    }
    if let Some(manifest) = read_cargo_toml(project.path(), params.include_dev) {
        project_dependencies.push(manifest);
    }

    let report = DependencyReport {
        file: file_path.clone(),
        dependencies,
        exports,
        project_dependencies,
    };
    let body =
        serde_json::to_string_pretty(&report).map_err(|e| ToolError::Internal(e.to_string()))?;
    Ok(ToolOutput::found(format!(
        "Dependency analysis for {file_path}:\n{body}"
    )))
}

fn read_package_json(root: &Path, include_dev: bool) -> Option<ManifestDependencies> {
    let text = read_text(&root.join("package.json"))?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    let table = |key: &str| -> BTreeMap<String, String> {
        value[key]
            .as_object()
            .map(|deps| {
                deps.iter()
                    .map(|(name, version)| {
                        (name.clone(), version.as_str().unwrap_or("*").to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    Some(ManifestDependencies {
        manifest: "package.json".into(),
        dependencies: table("dependencies"),
        dev_dependencies: if include_dev {
            table("devDependencies")
        } else {
            BTreeMap::new()
        },
    })
}

fn read_cargo_toml(root: &Path, include_dev: bool) -> Option<ManifestDependencies> {
    let text = read_text(&root.join("Cargo.toml"))?;
    let value: toml::Table = toml::from_str(&text).ok()?;

    let describe = |spec: &toml::Value| -> String {
        match spec {
            toml::Value::String(version) => version.clone(),
            toml::Value::Table(table) => {
                if let Some(version) = table.get("version").and_then(|v| v.as_str()) {
                    version.to_string()
                } else if let Some(path) = table.get("path").and_then(|v| v.as_str()) {
                    format!("path:{path}")
                } else if table.get("workspace").and_then(|v| v.as_bool()) == Some(true) {
                    "workspace".to_string()
                } else if let Some(git) = table.get("git").and_then(|v| v.as_str()) {
                    format!("git:{git}")
                } else {
                    "*".to_string()
                }
            }
            _ => "*".to_string(),
        }
    };
    let section = |table: Option<&toml::Value>| -> BTreeMap<String, String> {
        table
            .and_then(|t| t.as_table())
            .map(|deps| {
                deps.iter()
                    .map(|(name, spec)| (name.clone(), describe(spec)))
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut dependencies = section(value.get("dependencies"));
    if let Some(workspace) = value.get("workspace").and_then(|w| w.as_table()) {
        dependencies.extend(section(workspace.get("dependencies")));
    }
    Some(ManifestDependencies {
        manifest: "Cargo.toml".into(),
        dependencies,
        dev_dependencies: if include_dev {
            section(value.get("dev-dependencies"))
        } else {
            BTreeMap::new()
        },
    })
}

fn missing_root(project: &ProjectRoot) -> ToolOutput {
    ToolOutput::nothing(format!(
        "Project root not found: {}",
        project.path().display()
    ))
}
