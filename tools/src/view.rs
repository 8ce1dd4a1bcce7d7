//! View facade: read one window of one file.

use std::path::Path;

use rofs_types::{FileContent, FileWindow, OutputBudget};
use serde::Serialize;

use super::{Sandbox, StreamingFileReader, ToolError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewOutput {
    pub view: FileContent,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Viewer {
    file_reader: StreamingFileReader,
}

impl Viewer {
    #[must_use]
    pub fn new(file_reader: StreamingFileReader) -> Self {
        Self { file_reader }
    }

    #[must_use]
    pub fn from_sandbox(sandbox: Sandbox) -> Self {
        Self::new(StreamingFileReader::new(sandbox))
    }

    /// The returned window is the one actually read.
    pub fn view(
        &self,
        path: &Path,
        window: FileWindow,
        budget: &mut OutputBudget,
    ) -> Result<ViewOutput, ToolError> {
        let result = self.file_reader.read_window(path, window, budget)?;
        Ok(ViewOutput {
            view: FileContent {
                path: self.file_reader.sandbox().anchor(path),
                contents: result.contents,
                window: result.actual_window,
            },
            truncated: result.truncated,
        })
    }
}
