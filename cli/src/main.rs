//! rofs CLI - run the Glob, Grep, and View tools from a shell.
//!
//! Every invocation builds one sandbox and one output budget from the config
//! file and flags, runs a single operation, and prints the result to stdout.
//! Logs go to stderr so stdout stays parseable with `--json`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rofs_config::RofsConfig;
use rofs_tools::{
    DEFAULT_VIEW_LINES, GlobOutput, GlobPattern, Globber, GrepOutput, Grepper, RegexPattern,
    ToolRegistry, ViewOutput, Viewer, register_builtins,
};
use rofs_types::{FileWindow, OutputBudget};

#[derive(Debug, Parser)]
#[command(name = "rofs")]
#[command(about = "Read-only, budget-bounded filesystem tools")]
#[command(version)]
struct Cli {
    /// Sandbox root. Defaults to the configured root, then the working directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Deny access to this path (can be repeated)
    #[arg(long = "block", value_name = "PATH", global = true)]
    blocked: Vec<PathBuf>,

    /// Allow paths with components starting with '.'
    #[arg(long, global = true)]
    allow_hidden: bool,

    /// Output allowance in bytes
    #[arg(long, global = true)]
    budget: Option<usize>,

    /// Config file to use instead of ~/.rofs/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List paths matching glob patterns
    Glob {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Search file contents line by line
    Grep {
        regex: String,
        /// Files to search
        #[arg(default_value = "**/*")]
        patterns: Vec<String>,
    },
    /// Print a range of lines from a file
    View {
        path: PathBuf,
        /// Zero-based first line
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Maximum number of lines
        #[arg(long, default_value_t = DEFAULT_VIEW_LINES)]
        count: usize,
    },
    /// Invoke a tool by name with JSON arguments
    Call { tool: String, args: String },
    /// Print the tool definitions as JSON
    Tools,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RofsConfig> {
    if let Some(path) = path {
        return RofsConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()));
    }
    Ok(RofsConfig::load()?.unwrap_or_default())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let sandbox = config.sandbox(cli.root, cli.blocked, cli.allow_hidden);
    let settings = config.tool_settings();
    let mut budget = OutputBudget::new(cli.budget.unwrap_or_else(|| config.budget_limit()));

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Glob { patterns } => {
            let patterns = GlobPattern::parse_all(patterns)?;
            let output = Globber::from_sandbox(sandbox)
                .with_cost(settings.glob_cost)
                .glob(&patterns, &mut budget);
            tracing::info!(paths = output.paths.len(), truncated = output.truncated, "Glob");
            if cli.json {
                write_json(&mut out, &output)?;
            } else {
                render_glob(&mut out, &output)?;
            }
        }
        Command::Grep { regex, patterns } => {
            let regex = RegexPattern::new(&regex)?;
            let patterns = GlobPattern::parse_all(patterns)?;
            let output = Grepper::from_sandbox(sandbox).grep(&regex, &patterns, &mut budget);
            tracing::info!(
                matches = output.matches.len(),
                truncated = output.truncated,
                "Grep"
            );
            if cli.json {
                write_json(&mut out, &output)?;
            } else {
                render_grep(&mut out, &output)?;
            }
        }
        Command::View {
            path,
            offset,
            count,
        } => {
            let output = Viewer::from_sandbox(sandbox)
                .view(&path, FileWindow::new(offset, count), &mut budget)
                .with_context(|| format!("viewing {}", path.display()))?;
            tracing::info!(
                lines = output.view.window.line_count,
                truncated = output.truncated,
                "View"
            );
            if cli.json {
                write_json(&mut out, &output)?;
            } else {
                render_view(&mut out, &output)?;
            }
        }
        Command::Call { tool, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("tool arguments must be valid JSON")?;
            let mut registry = ToolRegistry::default();
            register_builtins(&mut registry, &sandbox, settings)?;
            let value = registry.execute(&tool, &args, &mut budget)?;
            write_json(&mut out, &value)?;
        }
        Command::Tools => {
            let mut registry = ToolRegistry::default();
            register_builtins(&mut registry, &sandbox, settings)?;
            write_json(&mut out, &registry.definitions())?;
        }
    }

    out.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn render_glob(out: &mut impl Write, output: &GlobOutput) -> io::Result<()> {
    for path in &output.paths {
        writeln!(out, "{}", path.display())?;
    }
    render_truncation(out, output.truncated)
}

/// One `path:line:text` row per match, with 1-based line numbers.
fn render_grep(out: &mut impl Write, output: &GrepOutput) -> io::Result<()> {
    for span in &output.matches {
        let text = span.contents.trim_end_matches(['\n', '\r']);
        writeln!(
            out,
            "{}:{}:{text}",
            span.path.display(),
            span.window.line_offset + 1
        )?;
    }
    render_truncation(out, output.truncated)
}

fn render_view(out: &mut impl Write, output: &ViewOutput) -> io::Result<()> {
    let contents = &output.view.contents;
    out.write_all(contents.as_bytes())?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        writeln!(out)?;
    }
    render_truncation(out, output.truncated)
}

fn render_truncation(out: &mut impl Write, truncated: bool) -> io::Result<()> {
    if truncated {
        writeln!(out, "[truncated]")?;
    }
    Ok(())
}
