//! Read-only codebase inspection tools for the stagecraft agents.
//!
//! - [`tools`]: the [`tools::InspectionTool`] trait and a name-keyed
//!   [`tools::ToolRegistry`].
//! - [`builtin_tools`]: `search`, `describe_file`, `describe_project`,
//!   `find_identifier` and `describe_dependencies`.
//! - [`project`]: the project root the tools read from.

pub mod builtin_tools;
pub mod project;
pub mod tools;

pub use tools::{InspectionTool, ToolDefinition, ToolError, ToolOutput, ToolRegistry};
