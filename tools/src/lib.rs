//! Read-only filesystem tools - sandbox, streaming primitives, and the Glob/Grep/View facades.
//!
//! Every operation takes a live [`OutputBudget`] and reports truncation through a flag
//! on its output instead of failing when the allowance runs out.

pub mod builtins;
pub mod enumerate;
pub mod glob;
pub mod grep;
pub mod pattern;
pub mod reader;
pub mod sandbox;
pub mod search;
pub mod view;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rofs_types::OutputBudget;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builtins::{DEFAULT_VIEW_LINES, register_builtins};
pub use enumerate::{FilesystemPathEnumerator, PathIter};
pub use glob::{GlobCost, GlobOutput, Globber};
pub use grep::{GrepOutput, Grepper};
pub use pattern::{GlobPattern, RegexPattern};
pub use reader::StreamingFileReader;
pub use sandbox::Sandbox;
pub use search::{MatchIter, StreamingRegexSearcher};
pub use view::{ViewOutput, Viewer};

/// Error types for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Sandbox violation: {0}")]
    SandboxViolation(DenialReason),
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
    #[error("Invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("Tool execution failed: {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why the sandbox refused a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    EmptyPath,
    /// Resolution of the path or the root failed; access fails closed.
    Unresolvable {
        attempted: PathBuf,
    },
    PathOutsideSandbox {
        attempted: PathBuf,
        resolved: PathBuf,
    },
    HiddenComponent {
        attempted: PathBuf,
        component: String,
    },
    Blocked {
        attempted: PathBuf,
        resolved: PathBuf,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::EmptyPath => write!(f, "Empty path"),
            DenialReason::Unresolvable { attempted } => {
                write!(f, "Path could not be resolved: {}", attempted.display())
            }
            DenialReason::PathOutsideSandbox {
                attempted,
                resolved,
            } => write!(
                f,
                "Path outside sandbox (attempted: {}, resolved: {})",
                attempted.display(),
                resolved.display()
            ),
            DenialReason::HiddenComponent {
                attempted,
                component,
            } => write!(
                f,
                "Path '{}' has hidden component '{component}'",
                attempted.display()
            ),
            DenialReason::Blocked {
                attempted,
                resolved,
            } => write!(
                f,
                "Path '{}' is blocked (resolved: {})",
                attempted.display(),
                resolved.display()
            ),
        }
    }
}

/// Output units charged for reporting `path`: the byte length of its string form.
pub(crate) fn path_cost(path: &Path) -> usize {
    path.to_string_lossy().len()
}

/// Tool definition as exposed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Aggregated tool settings derived from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ToolSettings {
    #[serde(default)]
    pub glob_cost: GlobCost,
}

/// A tool callable with JSON arguments against a caller-owned budget.
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    fn approval_summary(&self, args: &Value) -> Result<String, ToolError>;
    fn execute(&self, args: &Value, budget: &mut OutputBudget) -> Result<Value, ToolError>;
}

pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Tool registry keyed by tool name.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Look up `name` and run it against `budget`.
    pub fn execute(
        &self,
        name: &str,
        args: &Value,
        budget: &mut OutputBudget,
    ) -> Result<Value, ToolError> {
        let executor = self.lookup(name)?;
        tracing::debug!(
            tool = name,
            summary = %executor.approval_summary(args)?,
            "Executing tool"
        );
        executor.execute(args, budget)
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition::new(exec.name(), exec.description(), exec.schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}
