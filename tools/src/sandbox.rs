use std::env;
use std::fs;
use std::io;
use std::path::{self, Component, Path, PathBuf};

use super::{DenialReason, ToolError};

/// Filesystem sandbox configuration and validation.
///
/// A path is allowed when its resolved form (symlinks followed, `..` applied) is the
/// root or lies beneath it, has no hidden component below the root (unless hidden
/// entries are allowed), and is not one of the blocked entries. The hidden rule is
/// applied to the path as given as well as to its resolved form, so neither a
/// dot-named symlink nor a `.git/..` detour reaches a visible file.
///
/// Neither the root nor the blocked entries need to exist. The root is resolved on
/// every check; blocked entries are resolved once, here.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    blocked: Vec<PathBuf>,
    /// Relative blocked entries, also denied when they resolve under the root.
    blocked_relative: Vec<PathBuf>,
    allow_hidden: bool,
}

/// Internal three-valued decision. `Indeterminate` is denied.
#[derive(Debug)]
pub(crate) enum Verdict {
    Allowed { resolved: PathBuf },
    Denied(DenialReason),
    Indeterminate,
}

impl Sandbox {
    pub fn new(
        root: impl Into<PathBuf>,
        blocked: impl IntoIterator<Item = PathBuf>,
        allow_hidden: bool,
    ) -> Self {
        let root = root.into();
        let mut resolved_blocked = Vec::new();
        let mut blocked_relative = Vec::new();
        for entry in blocked {
            resolved_blocked.push(resolve_blocked(&entry, &root));
            if entry.is_relative() {
                blocked_relative.push(entry);
            }
        }

        Self {
            root,
            blocked: resolved_blocked,
            blocked_relative,
            allow_hidden,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blocked entries in their construction-time resolved form.
    #[must_use]
    pub fn blocked(&self) -> &[PathBuf] {
        &self.blocked
    }

    #[must_use]
    pub fn allow_hidden(&self) -> bool {
        self.allow_hidden
    }

    /// Anchor a relative path at the sandbox root; absolute paths are returned as-is.
    #[must_use]
    pub fn anchor(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Whether `path` may be accessed. Never fails; any ambiguity denies.
    #[must_use]
    pub fn is_allowed(&self, path: &Path) -> bool {
        matches!(self.check(path), Verdict::Allowed { .. })
    }

    /// Return `path` unchanged if allowed, otherwise a sandbox violation.
    pub fn require_allowed<'a>(&self, path: &'a Path) -> Result<&'a Path, ToolError> {
        match self.check(path) {
            Verdict::Allowed { .. } => Ok(path),
            Verdict::Denied(reason) => {
                tracing::debug!(%reason, "Sandbox denied path");
                Err(ToolError::SandboxViolation(reason))
            }
            Verdict::Indeterminate => {
                tracing::debug!(path = %path.display(), "Sandbox could not resolve path");
                Err(ToolError::SandboxViolation(DenialReason::Unresolvable {
                    attempted: path.to_path_buf(),
                }))
            }
        }
    }

    /// Resolved form of `path` if it is allowed.
    pub(crate) fn resolve_allowed(&self, path: &Path) -> Option<PathBuf> {
        match self.check(path) {
            Verdict::Allowed { resolved } => Some(resolved),
            Verdict::Denied(_) | Verdict::Indeterminate => None,
        }
    }

    pub(crate) fn check(&self, path: &Path) -> Verdict {
        if path.as_os_str().is_empty() {
            return Verdict::Denied(DenialReason::EmptyPath);
        }

        let Ok(root) = resolve_lenient(&self.root) else {
            return Verdict::Indeterminate;
        };
        let anchored = self.anchor(path);
        let Ok(resolved) = resolve_lenient(&anchored) else {
            return Verdict::Indeterminate;
        };

        let Ok(relative) = resolved.strip_prefix(&root) else {
            return Verdict::Denied(DenialReason::PathOutsideSandbox {
                attempted: path.to_path_buf(),
                resolved,
            });
        };

        // Both the name as given and the resolved target must be visible.
        let as_given = anchored
            .strip_prefix(&self.root)
            .or_else(|_| anchored.strip_prefix(&root))
            .ok();
        let hidden = as_given
            .and_then(first_hidden_component)
            .or_else(|| first_hidden_component(relative));
        if !self.allow_hidden
            && let Some(component) = hidden
        {
            return Verdict::Denied(DenialReason::HiddenComponent {
                attempted: path.to_path_buf(),
                component,
            });
        }

        if self.is_blocked(&resolved, &root) {
            return Verdict::Denied(DenialReason::Blocked {
                attempted: path.to_path_buf(),
                resolved,
            });
        }

        Verdict::Allowed { resolved }
    }

    fn is_blocked(&self, resolved: &Path, root: &Path) -> bool {
        self.blocked.iter().any(|entry| entry == resolved)
            || self
                .blocked_relative
                .iter()
                .any(|entry| resolve_lenient(&root.join(entry)).is_ok_and(|p| p == resolved))
    }
}

/// Resolve a blocked entry against the working directory, falling back to the root.
fn resolve_blocked(entry: &Path, root: &Path) -> PathBuf {
    let absolute = if entry.is_absolute() {
        entry.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| root.join(entry), |cwd| cwd.join(entry))
    };
    resolve_lenient(&absolute).unwrap_or(absolute)
}

/// Resolve `path` to an absolute form, following symlinks wherever the path exists.
///
/// Missing tails are appended component by component: `..` pops, `.` is skipped,
/// and every prefix that exists on disk is canonicalized again so a symlink
/// anywhere along the way is followed. Any canonicalization failure on an
/// existing prefix (dangling link, loop, permission) is returned as an error.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute = path::absolute(path)?;
    if let Ok(canonical) = fs::canonicalize(&absolute) {
        return Ok(canonical);
    }

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if fs::symlink_metadata(&resolved).is_ok() {
                    resolved = fs::canonicalize(&resolved)?;
                }
            }
        }
    }
    Ok(resolved)
}

fn first_hidden_component(relative: &Path) -> Option<String> {
    relative.components().find_map(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.').then(|| name.into_owned())
        }
        _ => None,
    })
}
