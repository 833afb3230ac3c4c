use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::builtin_tools;
use crate::project::ProjectRoot;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid parameters for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("io error: {0}")]
    Io(String),

    #[error("internal tool error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_params(tool: &str, message: impl Into<String>) -> Self {
        ToolError::InvalidParams {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Text report produced by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub text: String,
    /// `true` when the report only explains that nothing was found
    /// (missing file, no match, empty project).
    pub found_nothing: bool,
}

impl ToolOutput {
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            found_nothing: false,
        }
    }

    pub fn nothing(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            found_nothing: true,
        }
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// Description of a tool as advertised to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A read-only operation over the project under analysis.
///
/// Implementations never fail because something is absent; a missing file
/// or empty match set is reported through [`ToolOutput::nothing`].
#[async_trait]
pub trait InspectionTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> serde_json::Value;

    async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Decode tool parameters, mapping serde errors to [`ToolError::InvalidParams`].
pub fn parse_params<T: serde::de::DeserializeOwned>(
    tool: &str,
    params: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::invalid_params(tool, e.to_string()))
}

/// Run filesystem work off the async executor.
pub(crate) async fn run_blocking<F>(work: F) -> Result<ToolOutput, ToolError>
where
    F: FnOnce() -> Result<ToolOutput, ToolError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::Internal(e.to_string()))?
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name-keyed collection of tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn InspectionTool>>,
    /// Registration order, for stable listings.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the five built-in tools, rooted at `root`.
    pub fn with_builtins(root: impl Into<PathBuf>) -> Self {
        let project = Arc::new(ProjectRoot::new(root));
        let mut registry = Self::new();
        for tool in builtin_tools::builtin_tools(project) {
            registry.register(tool);
        }
        registry
    }

    /// Register `tool`, replacing (and returning) any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn InspectionTool>) -> Option<Arc<dyn InspectionTool>> {
        let name = tool.name().to_string();
        let previous = self.tools.insert(name.clone(), tool);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn InspectionTool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Invoke the tool registered under `name`.
    pub async fn invoke(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let result = tool.invoke(params).await;
        match &result {
            Ok(output) => info!(
                tool = name,
                found_nothing = output.found_nothing,
                chars = output.text.len(),
                "inspection tool invoked"
            ),
            Err(e) => warn!(tool = name, error = %e, "inspection tool failed"),
        }
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
