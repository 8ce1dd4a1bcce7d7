//! Grep facade: regex search across the files matched by a set of globs.
//!
//! One budget spans every file. A file that cannot be opened or read is
//! skipped; the search carries on with the next one.

use rofs_types::{FileContent, OutputBudget};
use serde::Serialize;

use super::{FilesystemPathEnumerator, GlobPattern, RegexPattern, Sandbox, StreamingRegexSearcher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrepOutput {
    pub matches: Vec<FileContent>,
    /// Set when at least one matching line was dropped for lack of budget.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Grepper {
    path_enum: FilesystemPathEnumerator,
    regex_searcher: StreamingRegexSearcher,
}

impl Grepper {
    #[must_use]
    pub fn new(path_enum: FilesystemPathEnumerator, regex_searcher: StreamingRegexSearcher) -> Self {
        Self {
            path_enum,
            regex_searcher,
        }
    }

    #[must_use]
    pub fn from_sandbox(sandbox: Sandbox) -> Self {
        Self::new(
            FilesystemPathEnumerator::new(sandbox.clone()),
            StreamingRegexSearcher::new(sandbox),
        )
    }

    #[must_use]
    pub fn grep(
        &self,
        pattern: &RegexPattern,
        globs: &[GlobPattern],
        budget: &mut OutputBudget,
    ) -> GrepOutput {
        let mut output = GrepOutput {
            matches: Vec::new(),
            truncated: false,
        };

        for path in self.path_enum.iter_paths(globs) {
            if !path.is_file() {
                continue;
            }

            let mut iter = match self.regex_searcher.iter_matches(&path, pattern, budget) {
                Ok(iter) => iter,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "Skipping file");
                    continue;
                }
            };
            for span in iter.by_ref() {
                match span {
                    Ok(span) => output.matches.push(span),
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "Stopped reading file");
                    }
                }
            }

            if iter.skipped() > 0 {
                output.truncated = true;
            }
            drop(iter);
            if output.truncated && budget.is_exhausted() {
                break;
            }
        }

        tracing::debug!(
            matches = output.matches.len(),
            truncated = output.truncated,
            "Grep finished"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tempfile::tempdir;

    fn globs(raw: &[&str]) -> Vec<GlobPattern> {
        GlobPattern::parse_all(raw.iter().copied()).unwrap()
    }

    #[test]
    fn finds_matches_across_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test1.py"), "def foo():\n    pass\n").unwrap();
        fs::write(temp.path().join("test2.py"), "x = 1\ndef bar():\n").unwrap();
        let grepper = Grepper::from_sandbox(Sandbox::new(temp.path(), Vec::new(), false));

        let mut budget = OutputBudget::new(10_000);
        let pattern = RegexPattern::new(r"def \w+").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.py"]), &mut budget);

        assert_eq!(output.matches.len(), 2);
        assert!(!output.truncated);
        let mut found: Vec<(String, usize)> = output
            .matches
            .iter()
            .map(|m| {
                (
                    m.path.file_name().unwrap().to_string_lossy().into_owned(),
                    m.window.line_offset,
                )
            })
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![("test1.py".to_string(), 0), ("test2.py".to_string(), 1)]
        );
    }

    #[test]
    fn directories_are_not_searched() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("pkg.py")).unwrap();
        fs::write(temp.path().join("mod.py"), "def x():\n").unwrap();
        let grepper = Grepper::from_sandbox(Sandbox::new(temp.path(), Vec::new(), false));

        let mut budget = OutputBudget::new(10_000);
        let pattern = RegexPattern::new("def").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.py"]), &mut budget);
        assert_eq!(output.matches.len(), 1);
    }

    #[test]
    fn blocked_file_is_skipped_without_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("open.txt"), "token\n").unwrap();
        fs::write(temp.path().join("secret.txt"), "token\n").unwrap();
        let sandbox = Sandbox::new(temp.path(), vec![temp.path().join("secret.txt")], false);
        let grepper = Grepper::from_sandbox(sandbox);

        let mut budget = OutputBudget::new(10_000);
        let pattern = RegexPattern::new("token").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.txt"]), &mut budget);
        assert_eq!(output.matches.len(), 1);
        assert_eq!(output.matches[0].path, temp.path().join("open.txt"));
    }

    #[test]
    fn skipped_line_marks_output_truncated() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("a.txt"),
            "match with a very long tail\nmatch\n",
        )
        .unwrap();
        let grepper = Grepper::from_sandbox(Sandbox::new(temp.path(), Vec::new(), false));

        let mut budget = OutputBudget::new(10);
        let pattern = RegexPattern::new("match").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.txt"]), &mut budget);
        assert_eq!(output.matches.len(), 1);
        assert_eq!(output.matches[0].contents, "match\n");
        assert!(output.truncated);
    }

    #[test]
    fn exhausted_budget_stops_across_files() {
        let temp = tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(temp.path().join(name), "hit\nhit\n").unwrap();
        }
        let grepper = Grepper::from_sandbox(Sandbox::new(temp.path(), Vec::new(), false));

        let mut budget = OutputBudget::new(12);
        let pattern = RegexPattern::new("hit").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.txt"]), &mut budget);
        assert_eq!(output.matches.len(), 3);
        assert!(output.truncated);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn file_the_searcher_cannot_open_is_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "hit\n").unwrap();
        fs::write(temp.path().join("denied.txt"), "hit\n").unwrap();
        fs::write(temp.path().join("z.txt"), "hit\nhit\n").unwrap();
        let listing = Sandbox::new(temp.path(), Vec::new(), false);
        let reading = Sandbox::new(temp.path(), vec![temp.path().join("denied.txt")], false);
        let grepper = Grepper::new(
            FilesystemPathEnumerator::new(listing),
            StreamingRegexSearcher::new(reading),
        );

        let mut budget = OutputBudget::new(10_000);
        let pattern = RegexPattern::new("hit").unwrap();
        let output = grepper.grep(&pattern, &globs(&["*.txt"]), &mut budget);

        let mut found: Vec<(String, usize)> = output
            .matches
            .iter()
            .map(|m| {
                (
                    m.path.file_name().unwrap().to_string_lossy().into_owned(),
                    m.window.line_offset,
                )
            })
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("a.txt".to_string(), 0),
                ("z.txt".to_string(), 0),
                ("z.txt".to_string(), 1)
            ]
        );
        assert!(!output.truncated);
        assert_eq!(budget.remaining(), 10_000 - 12);
    }

    #[cfg(unix)]
    #[test]
    fn hidden_symlink_is_not_searched() {
        use std::os::unix::fs::symlink;

        let temp = tempdir().unwrap();
        fs::write(temp.path().join("visible.txt"), "TOKEN=x\n").unwrap();
        symlink(temp.path().join("visible.txt"), temp.path().join(".env")).unwrap();
        let grepper = Grepper::from_sandbox(Sandbox::new(temp.path(), Vec::new(), false));

        let mut budget = OutputBudget::new(10_000);
        let pattern = RegexPattern::new("TOKEN").unwrap();
        let output = grepper.grep(&pattern, &globs(&[".env"]), &mut budget);
        assert!(output.matches.is_empty());
        assert!(!output.truncated);
    }
}
