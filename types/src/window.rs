//! Line windows and the content spans tied to them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A line-range descriptor: `line_count` lines starting at zero-based `line_offset`.
///
/// As a request it says what the caller wants; as a response it reports what
/// was actually produced, which may be fewer lines but never more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileWindow {
    pub line_offset: usize,
    pub line_count: usize,
}

impl FileWindow {
    #[must_use]
    pub const fn new(line_offset: usize, line_count: usize) -> Self {
        Self {
            line_offset,
            line_count,
        }
    }

    /// Window covering exactly one line.
    #[must_use]
    pub const fn single_line(line_offset: usize) -> Self {
        Self::new(line_offset, 1)
    }
}

/// One unit of returned text tied to a path and the window it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: PathBuf,
    pub contents: String,
    pub window: FileWindow,
}

/// Outcome of a windowed read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResult {
    pub contents: String,
    pub truncated: bool,
    /// Window that was actually read, not the one requested.
    pub actual_window: FileWindow,
}
