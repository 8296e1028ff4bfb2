// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::exporters::file::{FileExporterError, Result, ResultSink, append_synced};
use crate::receivers::lgp::classifier::ErrorEntry;

/// Appends entries as JSON lines: `{"timestamp":"...","message":"..."}`.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ResultSink for JsonLinesSink {
    fn append(&mut self, entries: &[ErrorEntry]) -> Result<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)
                .map_err(|e| FileExporterError::Export(format!("Failed to write JSON: {}", e)))?;
            buf.push(b'\n');
        }
        append_synced(&self.path, &buf)
    }
}
