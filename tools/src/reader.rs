//! Windowed, budget-aware file reads.

use std::fs::{File, Metadata};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use rofs_types::{FileReadResult, FileWindow, OutputBudget};

use super::{Sandbox, ToolError, path_cost};

#[derive(Debug, Clone)]
pub struct StreamingFileReader {
    sandbox: Sandbox,
}

impl StreamingFileReader {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Read `window` from `file`, charging the path and every appended line to `budget`.
    ///
    /// The path cost is debited once before any line. Reading stops at the first
    /// line that does not fit; everything accumulated so far is returned with
    /// `truncated` set. Invalid UTF-8 is replaced rather than rejected. Lines keep
    /// their terminators.
    ///
    /// Sandbox denials and filesystem errors are returned as errors; running out
    /// of budget never is. Anything but a regular file is rejected before the
    /// path is charged.
    pub fn read_window(
        &self,
        file: &Path,
        window: FileWindow,
        budget: &mut OutputBudget,
    ) -> Result<FileReadResult, ToolError> {
        let path = self.sandbox.anchor(file);
        self.sandbox.require_allowed(&path)?;
        let handle = File::open(&path).map_err(|e| ToolError::io(&path, e))?;
        let meta = handle.metadata().map_err(|e| ToolError::io(&path, e))?;
        if !meta.is_file() {
            return Err(ToolError::io(&path, not_a_file(&meta)));
        }
        let mut reader = BufReader::new(handle);

        let mut result = FileReadResult {
            contents: String::new(),
            truncated: false,
            actual_window: FileWindow::new(window.line_offset, 0),
        };

        if budget.debit(path_cost(&path)).is_err() {
            tracing::debug!(path = %path.display(), "Budget exhausted before reading");
            result.truncated = true;
            return Ok(result);
        }

        for _ in 0..window.line_offset {
            let skipped = reader
                .skip_until(b'\n')
                .map_err(|e| ToolError::io(&path, e))?;
            if skipped == 0 {
                return Ok(result);
            }
        }

        let mut line = Vec::new();
        while result.actual_window.line_count < window.line_count {
            line.clear();
            let keep = budget.remaining().saturating_add(1);
            let read = read_line_capped(&mut reader, &mut line, keep)
                .map_err(|e| ToolError::io(&path, e))?;
            if read == 0 {
                break;
            }
            if read > budget.remaining() {
                result.truncated = true;
                break;
            }

            let text = String::from_utf8_lossy(&line);
            if budget.debit(text.len()).is_err() {
                result.truncated = true;
                break;
            }
            result.contents.push_str(&text);
            result.actual_window.line_count += 1;
        }

        Ok(result)
    }
}

fn not_a_file(meta: &Metadata) -> io::Error {
    if meta.is_dir() {
        io::Error::from(io::ErrorKind::IsADirectory)
    } else {
        io::Error::new(io::ErrorKind::InvalidInput, "not a regular file")
    }
}

/// Read one line, terminator included, keeping at most `keep` bytes of it in `buf`.
///
/// The rest of a longer line is consumed and dropped, so memory stays bounded no
/// matter how long the line is. Returns the full length of the line; 0 at end of file.
pub(crate) fn read_line_capped<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    keep: usize,
) -> io::Result<usize> {
    let mut total = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if available.is_empty() {
            return Ok(total);
        }

        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (end + 1, true),
            None => (available.len(), false),
        };
        let room = keep.saturating_sub(buf.len());
        buf.extend_from_slice(&available[..used.min(room)]);
        reader.consume(used);
        total += used;
        if done {
            return Ok(total);
        }
    }
}
