//! Built-in tool executors.

use std::path::Path;

use rofs_types::{FileWindow, OutputBudget};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    GlobCost, GlobPattern, Globber, Grepper, RegexPattern, Sandbox, ToolError, ToolExecutor,
    ToolRegistry, ToolSettings, Viewer, parse_args,
};

/// Lines returned by View when the caller gives no `line_count`.
pub const DEFAULT_VIEW_LINES: usize = 2000;

#[derive(Debug, Clone)]
pub struct GlobTool {
    globber: Globber,
}

#[derive(Debug, Clone)]
pub struct GrepTool {
    grepper: Grepper,
}

#[derive(Debug, Clone)]
pub struct ViewTool {
    viewer: Viewer,
}

impl GlobTool {
    #[must_use]
    pub fn new(sandbox: Sandbox, cost: GlobCost) -> Self {
        Self {
            globber: Globber::from_sandbox(sandbox).with_cost(cost),
        }
    }
}

impl GrepTool {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            grepper: Grepper::from_sandbox(sandbox),
        }
    }
}

impl ViewTool {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            viewer: Viewer::from_sandbox(sandbox),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GlobArgs {
    patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrepArgs {
    pattern: String,
    #[serde(default = "default_grep_globs")]
    globs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ViewArgs {
    path: String,
    #[serde(default)]
    line_offset: usize,
    #[serde(default = "default_view_lines")]
    line_count: usize,
}

fn default_grep_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

const fn default_view_lines() -> usize {
    DEFAULT_VIEW_LINES
}

fn to_output<T: Serialize>(tool: &str, output: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

fn require_patterns(patterns: &[String], field: &str) -> Result<(), ToolError> {
    if patterns.is_empty() {
        return Err(ToolError::BadArgs {
            message: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

impl ToolExecutor for GlobTool {
    fn name(&self) -> &'static str {
        "Glob"
    }

    fn description(&self) -> &'static str {
        "List paths under the sandbox root matching any of the given glob patterns"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "patterns": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Glob patterns relative to the sandbox root (e.g., '**/*.rs', 'src/*.{ts,tsx}'). '*' never crosses '/'; use '**' to recurse."
                }
            },
            "required": ["patterns"]
        })
    }

    fn approval_summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: GlobArgs = parse_args(args)?;
        Ok(format!("Glob {}", typed.patterns.join(", ")))
    }

    fn execute(
        &self,
        args: &serde_json::Value,
        budget: &mut OutputBudget,
    ) -> Result<serde_json::Value, ToolError> {
        let typed: GlobArgs = parse_args(args)?;
        require_patterns(&typed.patterns, "patterns")?;
        let patterns = GlobPattern::parse_all(typed.patterns)?;
        let output = self.globber.glob(&patterns, budget);
        to_output(self.name(), &output)
    }
}

impl ToolExecutor for GrepTool {
    fn name(&self) -> &'static str {
        "Grep"
    }

    fn description(&self) -> &'static str {
        "Search file contents line by line with a regular expression"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression tested against each line separately. Matches never span lines."
                },
                "globs": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Glob patterns selecting the files to search. Defaults to ['**/*']."
                }
            },
            "required": ["pattern"]
        })
    }

    fn approval_summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: GrepArgs = parse_args(args)?;
        Ok(format!(
            "Grep /{}/ in {}",
            typed.pattern,
            typed.globs.join(", ")
        ))
    }

    fn execute(
        &self,
        args: &serde_json::Value,
        budget: &mut OutputBudget,
    ) -> Result<serde_json::Value, ToolError> {
        let typed: GrepArgs = parse_args(args)?;
        require_patterns(&typed.globs, "globs")?;
        let pattern = RegexPattern::new(&typed.pattern)?;
        let globs = GlobPattern::parse_all(typed.globs)?;
        let output = self.grepper.grep(&pattern, &globs, budget);
        to_output(self.name(), &output)
    }
}

impl ToolExecutor for ViewTool {
    fn name(&self) -> &'static str {
        "View"
    }

    fn description(&self) -> &'static str {
        "Read a range of lines from one file"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to read, absolute or relative to the sandbox root."
                },
                "line_offset": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based line to start at. Defaults to 0."
                },
                "line_count": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Maximum number of lines to return. Defaults to 2000."
                }
            },
            "required": ["path"]
        })
    }

    fn approval_summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: ViewArgs = parse_args(args)?;
        let end = typed.line_offset.saturating_add(typed.line_count);
        Ok(format!("View {} lines {}..{end}", typed.path, typed.line_offset))
    }

    fn execute(
        &self,
        args: &serde_json::Value,
        budget: &mut OutputBudget,
    ) -> Result<serde_json::Value, ToolError> {
        let typed: ViewArgs = parse_args(args)?;
        let window = FileWindow::new(typed.line_offset, typed.line_count);
        let output = self.viewer.view(Path::new(&typed.path), window, budget)?;
        to_output(self.name(), &output)
    }
}

/// Register the Glob, Grep, and View tools, all confined to `sandbox`.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    sandbox: &Sandbox,
    settings: ToolSettings,
) -> Result<(), ToolError> {
    registry.register(Box::new(GlobTool::new(sandbox.clone(), settings.glob_cost)))?;
    registry.register(Box::new(GrepTool::new(sandbox.clone())))?;
    registry.register(Box::new(ViewTool::new(sandbox.clone())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tempfile::{TempDir, tempdir};

    fn registry_in(temp: &TempDir) -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        let sandbox = Sandbox::new(temp.path(), Vec::new(), false);
        register_builtins(&mut registry, &sandbox, ToolSettings::default()).unwrap();
        registry
    }

    #[test]
    fn builtins_are_listed_by_name() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Glob", "Grep", "View"]);
    }

    #[test]
    fn registering_twice_fails() {
        let temp = tempdir().unwrap();
        let mut registry = registry_in(&temp);
        let sandbox = Sandbox::new(temp.path(), Vec::new(), false);
        let err = register_builtins(&mut registry, &sandbox, ToolSettings::default()).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "Glob"));
    }

    #[test]
    fn glob_tool_returns_paths_and_flag() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "").unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10_000);
        let value = registry
            .execute("Glob", &json!({ "patterns": ["*.rs"] }), &mut budget)
            .unwrap();
        assert_eq!(value["truncated"], json!(false));
        assert_eq!(
            value["paths"],
            json!([temp.path().join("a.rs").to_string_lossy()])
        );
    }

    #[test]
    fn glob_tool_rejects_empty_pattern_list() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10);
        let err = registry
            .execute("Glob", &json!({ "patterns": [] }), &mut budget)
            .unwrap_err();
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }

    #[test]
    fn glob_tool_reports_invalid_pattern() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10);
        let err = registry
            .execute("Glob", &json!({ "patterns": ["src/[oops"] }), &mut budget)
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidGlob { .. }));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10);
        let err = registry
            .execute("View", &json!({ "path": "x", "lines": 3 }), &mut budget)
            .unwrap_err();
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }

    #[test]
    fn grep_tool_defaults_to_all_files() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/lib.rs"), "fn main() {}\n").unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10_000);
        let value = registry
            .execute("Grep", &json!({ "pattern": "fn \\w+" }), &mut budget)
            .unwrap();
        assert_eq!(value["matches"].as_array().unwrap().len(), 1);
        assert_eq!(value["matches"][0]["contents"], json!("fn main() {}\n"));
        assert_eq!(value["matches"][0]["window"]["line_offset"], json!(0));
    }

    #[test]
    fn grep_tool_reports_invalid_regex() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10);
        let err = registry
            .execute("Grep", &json!({ "pattern": "(" }), &mut budget)
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidRegex { .. }));
    }

    #[test]
    fn view_tool_reads_window() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.md"), "one\ntwo\nthree\n").unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10_000);
        let value = registry
            .execute(
                "View",
                &json!({ "path": "notes.md", "line_offset": 1, "line_count": 1 }),
                &mut budget,
            )
            .unwrap();
        assert_eq!(value["view"]["contents"], json!("two\n"));
        assert_eq!(value["view"]["window"]["line_count"], json!(1));
        assert_eq!(value["truncated"], json!(false));
    }

    #[test]
    fn view_tool_denies_escape() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let mut budget = OutputBudget::new(10_000);
        let err = registry
            .execute("View", &json!({ "path": "../../etc/passwd" }), &mut budget)
            .unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }

    #[test]
    fn approval_summaries_describe_the_call() {
        let temp = tempdir().unwrap();
        let registry = registry_in(&temp);

        let grep = registry.lookup("Grep").unwrap();
        assert_eq!(
            grep.approval_summary(&json!({ "pattern": "todo", "globs": ["*.rs"] }))
                .unwrap(),
            "Grep /todo/ in *.rs"
        );
        let view = registry.lookup("View").unwrap();
        assert_eq!(
            view.approval_summary(&json!({ "path": "a.txt", "line_offset": 5, "line_count": 10 }))
                .unwrap(),
            "View a.txt lines 5..15"
        );
    }
}
