// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::exporters::file::{Result, ResultSink, append_synced};
use crate::receivers::lgp::classifier::ErrorEntry;

/// Appends entries as `<YYYY-MM-DD hh:mm:ss> <message>` lines.
pub struct TextFileSink {
    path: PathBuf,
}

impl TextFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for TextFileSink {
    fn append(&mut self, entries: &[ErrorEntry]) -> Result<()> {
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&entry.to_string());
            buf.push('\n');
        }
        append_synced(&self.path, buf.as_bytes())
    }
}
