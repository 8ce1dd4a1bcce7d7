//! Streaming line-by-line regex search.
//!
//! A file is never buffered whole: each line is read, tested, and either
//! charged to the budget and yielded or dropped before the next one is read.
//! A line too long to return is held only up to a fixed prefix.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rofs_types::{FileContent, FileWindow, OutputBudget};

use super::reader::read_line_capped;
use super::{RegexPattern, Sandbox, ToolError};

/// Bytes of a line kept for matching when the line is too long to be returned.
///
/// Such a line is only ever counted as skipped, so a prefix is enough.
const MATCH_PREFIX_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct StreamingRegexSearcher {
    sandbox: Sandbox,
}

impl StreamingRegexSearcher {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Lazily yield every line of `file` matching `pattern`, one span per line.
    ///
    /// The sandbox check and the open happen here; reading happens as the
    /// iterator is advanced. A matching line that does not fit in `budget` is
    /// skipped and counted, and scanning continues with the next line.
    pub fn iter_matches<'a>(
        &self,
        file: &Path,
        pattern: &'a RegexPattern,
        budget: &'a mut OutputBudget,
    ) -> Result<MatchIter<'a>, ToolError> {
        let path = self.sandbox.anchor(file);
        self.sandbox.require_allowed(&path)?;
        let handle = File::open(&path).map_err(|e| ToolError::io(&path, e))?;

        Ok(MatchIter {
            reader: BufReader::new(handle),
            path,
            pattern,
            budget,
            line: Vec::new(),
            next_offset: 0,
            skipped: 0,
            done: false,
        })
    }
}

/// Iterator over the matching lines of one file.
///
/// Yields `Err` at most once, for a read failure, and then ends.
pub struct MatchIter<'a> {
    reader: BufReader<File>,
    path: PathBuf,
    pattern: &'a RegexPattern,
    budget: &'a mut OutputBudget,
    line: Vec<u8>,
    next_offset: usize,
    skipped: usize,
    done: bool,
}

impl MatchIter<'_> {
    /// Matching lines dropped so far because they did not fit in the budget.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for MatchIter<'_> {
    type Item = Result<FileContent, ToolError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            let keep = self
                .budget
                .remaining()
                .saturating_add(1)
                .max(MATCH_PREFIX_BYTES);
            match read_line_capped(&mut self.reader, &mut self.line, keep) {
                Ok(0) => self.done = true,
                Ok(len) => {
                    let offset = self.next_offset;
                    self.next_offset += 1;

                    let text = String::from_utf8_lossy(&self.line);
                    if !self.pattern.is_match(trim_line_ending(&text)) {
                        continue;
                    }
                    // A cut line is longer than the remaining budget.
                    let complete = len == self.line.len();
                    if complete && self.budget.debit(text.len()).is_ok() {
                        return Some(Ok(FileContent {
                            path: self.path.clone(),
                            contents: text.into_owned(),
                            window: FileWindow::single_line(offset),
                        }));
                    }

                    self.skipped += 1;
                    // Every line is at least one byte, so nothing further can fit.
                    if self.budget.is_exhausted() {
                        self.done = true;
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(ToolError::io(&self.path, err)));
                }
            }
        }
        None
    }
}

fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
