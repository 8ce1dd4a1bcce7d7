//! Lazy, deduplicated path enumeration over glob patterns.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::slice;

use ignore::{Walk, WalkBuilder};

use super::{GlobPattern, Sandbox};

/// Enumerates sandbox-allowed paths matching a set of globs.
#[derive(Debug, Clone)]
pub struct FilesystemPathEnumerator {
    sandbox: Sandbox,
}

impl FilesystemPathEnumerator {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Paths matching any of `patterns`, in pattern order.
    ///
    /// Within one pattern the order is whatever the directory walk produces.
    /// Each path is yielded at most once across all patterns, compared by its
    /// resolved form. Directories are yielded too when they match. Hidden and
    /// blocked entries are expanded like any other and then dropped by the
    /// sandbox. Nothing is read until the iterator is advanced.
    #[must_use]
    pub fn iter_paths<'a>(&'a self, patterns: &'a [GlobPattern]) -> PathIter<'a> {
        PathIter {
            sandbox: &self.sandbox,
            patterns: patterns.iter(),
            current: None,
            seen: HashSet::new(),
        }
    }
}

/// Iterator returned by [`FilesystemPathEnumerator::iter_paths`].
pub struct PathIter<'a> {
    sandbox: &'a Sandbox,
    patterns: slice::Iter<'a, GlobPattern>,
    current: Option<ActiveWalk<'a>>,
    seen: HashSet<PathBuf>,
}

struct ActiveWalk<'a> {
    pattern: &'a GlobPattern,
    base: PathBuf,
    walk: Walk,
}

impl<'a> PathIter<'a> {
    fn start_walk(&self, pattern: &'a GlobPattern) -> Option<ActiveWalk<'a>> {
        let prefix = pattern.literal_prefix();
        let base = if prefix.as_os_str().is_empty() {
            self.sandbox.root().to_path_buf()
        } else {
            self.sandbox.anchor(prefix)
        };

        match fs::metadata(&base) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                tracing::debug!(base = %base.display(), pattern = %pattern, "Glob base is not a directory");
                return None;
            }
            Err(err) => {
                tracing::debug!(base = %base.display(), pattern = %pattern, error = %err, "Glob base unavailable");
                return None;
            }
        }

        let mut builder = WalkBuilder::new(&base);
        builder
            .standard_filters(false)
            .follow_links(false)
            .max_depth(pattern.max_depth());

        Some(ActiveWalk {
            pattern,
            base,
            walk: builder.build(),
        })
    }
}

impl Iterator for PathIter<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if self.current.is_none() {
                let pattern = self.patterns.next()?;
                self.current = self.start_walk(pattern);
                continue;
            }
            let Some(active) = self.current.as_mut() else {
                continue;
            };

            let entry = match active.walk.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "Skipping unreadable entry");
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            let Ok(tail) = entry.path().strip_prefix(&active.base) else {
                continue;
            };
            if tail.as_os_str().is_empty() {
                continue;
            }

            let relative = active.pattern.literal_prefix().join(tail);
            if !active.pattern.is_match(&relative) {
                continue;
            }

            let candidate = self.sandbox.anchor(&relative);
            let Some(resolved) = self.sandbox.resolve_allowed(&candidate) else {
                continue;
            };
            if self.seen.insert(resolved) {
                return Some(candidate);
            }
        }
    }
}
