//! Glob facade: list matching paths under a budget.

use std::path::{Path, PathBuf};

use rofs_types::OutputBudget;
use serde::{Deserialize, Serialize};

use super::{FilesystemPathEnumerator, GlobPattern, Sandbox, path_cost};

/// How much each listed path costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobCost {
    /// The byte length of the path string.
    #[default]
    PathLength,
    /// One unit per path.
    PerPath,
}

impl GlobCost {
    #[must_use]
    pub fn units(self, path: &Path) -> usize {
        match self {
            GlobCost::PathLength => path_cost(path),
            GlobCost::PerPath => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobOutput {
    pub paths: Vec<PathBuf>,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Globber {
    path_enum: FilesystemPathEnumerator,
    cost: GlobCost,
}

impl Globber {
    #[must_use]
    pub fn new(path_enum: FilesystemPathEnumerator, cost: GlobCost) -> Self {
        Self { path_enum, cost }
    }

    #[must_use]
    pub fn from_sandbox(sandbox: Sandbox) -> Self {
        Self::new(FilesystemPathEnumerator::new(sandbox), GlobCost::default())
    }

    #[must_use]
    pub fn with_cost(mut self, cost: GlobCost) -> Self {
        self.cost = cost;
        self
    }

    #[must_use]
    pub fn cost(&self) -> GlobCost {
        self.cost
    }

    /// Collect paths until one does not fit in `budget`.
    #[must_use]
    pub fn glob(&self, patterns: &[GlobPattern], budget: &mut OutputBudget) -> GlobOutput {
        let mut output = GlobOutput {
            paths: Vec::new(),
            truncated: false,
        };
        for path in self.path_enum.iter_paths(patterns) {
            if budget.debit(self.cost.units(&path)).is_err() {
                output.truncated = true;
                break;
            }
            output.paths.push(path);
        }
        tracing::debug!(
            found = output.paths.len(),
            truncated = output.truncated,
            "Glob finished"
        );
        output
    }
}
