//! Configuration loading for rofs.
//!
//! Settings come from `~/.rofs/config.toml`. Every section is optional; a
//! missing file means defaults everywhere. Command-line flags are applied on
//! top by the caller.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rofs_tools::{GlobCost, Sandbox, ToolSettings};
use serde::Deserialize;
use toml::de;

/// Output allowance used when neither the config file nor the caller sets one.
pub const DEFAULT_MAX_OUTPUT: usize = 10_000;

#[derive(Debug, Default, Deserialize)]
pub struct RofsConfig {
    pub sandbox: Option<SandboxConfig>,
    pub budget: Option<BudgetConfig>,
    pub glob: Option<GlobConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SandboxConfig {
    /// Root directory. `${VAR}` references are expanded.
    pub root: Option<String>,
    /// Paths that are always denied. Relative entries are also checked under the root.
    #[serde(default)]
    pub blocked: Vec<String>,
    #[serde(default)]
    pub allow_hidden: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct BudgetConfig {
    pub max_output: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobConfig {
    #[serde(default)]
    pub cost: GlobCost,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Replace `${VAR}` with the value of `VAR`, or nothing if unset.
///
/// An unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl RofsConfig {
    /// Load from the default location. `Ok(None)` if there is no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {path:?}: {err}");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {path:?}: {err}");
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Configured root with environment variables expanded.
    #[must_use]
    pub fn sandbox_root(&self) -> Option<PathBuf> {
        self.sandbox
            .as_ref()
            .and_then(|s| s.root.as_deref())
            .map(|root| PathBuf::from(expand_env_vars(root)))
    }

    /// Build the sandbox, letting explicit arguments take precedence.
    ///
    /// The root falls back to the configured one, then to the working directory.
    /// `extra_blocked` is appended to the configured list; `allow_hidden` can only
    /// widen the configured setting.
    #[must_use]
    pub fn sandbox(
        &self,
        root: Option<PathBuf>,
        extra_blocked: Vec<PathBuf>,
        allow_hidden: bool,
    ) -> Sandbox {
        let root = root
            .or_else(|| self.sandbox_root())
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let section = self.sandbox.as_ref();
        let blocked = section
            .map(|s| s.blocked.iter().map(|b| PathBuf::from(expand_env_vars(b))))
            .into_iter()
            .flatten()
            .chain(extra_blocked);
        let allow_hidden = allow_hidden || section.is_some_and(|s| s.allow_hidden);

        tracing::debug!(root = %root.display(), allow_hidden, "Building sandbox");
        Sandbox::new(root, blocked, allow_hidden)
    }

    #[must_use]
    pub fn budget_limit(&self) -> usize {
        self.budget
            .as_ref()
            .and_then(|b| b.max_output)
            .unwrap_or(DEFAULT_MAX_OUTPUT)
    }

    #[must_use]
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            glob_cost: self.glob.as_ref().map(|g| g.cost).unwrap_or_default(),
        }
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rofs").join("config.toml"))
}
