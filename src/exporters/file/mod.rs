// SPDX-License-Identifier: Apache-2.0

//! File sinks for extracted error entries.
//!
//! Sinks only ever append. Each call writes the whole batch with a single
//! buffered write and syncs the file before returning, so a successful
//! return means the entries are durable.

mod json;
mod text;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::receivers::lgp::classifier::ErrorEntry;

pub use json::JsonLinesSink;
pub use text::TextFileSink;

/// Errors that can occur while appending results.
///
/// - `Io`: Underlying I/O error (e.g., permission denied, disk full).
///   Recovery: Check file system permissions and free space.
/// - `Export`: An entry could not be encoded.
#[derive(Debug, Error)]
pub enum FileExporterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export error: {0}")]
    Export(String),
}

/// Result type for file exporter operations.
pub type Result<T> = std::result::Result<T, FileExporterError>;

/// Output encoding of the result file
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// `<timestamp> <message>` per line
    #[default]
    Text,
    /// One JSON object per line
    Jsonl,
}

/// Destination for extracted error entries
pub trait ResultSink {
    /// Append `entries` in order. Must be durable when it returns.
    fn append(&mut self, entries: &[ErrorEntry]) -> Result<()>;
}

impl<T: ResultSink + ?Sized> ResultSink for Box<T> {
    fn append(&mut self, entries: &[ErrorEntry]) -> Result<()> {
        (**self).append(entries)
    }
}

/// Build the sink for `format` writing to `path`
pub fn build_sink(format: ResultFormat, path: impl AsRef<Path>) -> Box<dyn ResultSink> {
    match format {
        ResultFormat::Text => Box::new(TextFileSink::new(path)),
        ResultFormat::Jsonl => Box::new(JsonLinesSink::new(path)),
    }
}

/// Append `buf` to the file at `path`, creating it if needed, and sync it.
fn append_synced(path: &Path, buf: &[u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf)?;
    file.sync_all()?;
    Ok(())
}

/// Sink collecting entries in memory, for tests
#[cfg(test)]
#[derive(Default)]
pub struct VecSink {
    pub entries: Vec<ErrorEntry>,
    pub appends: usize,
    pub fail_appends: bool,
}

#[cfg(test)]
impl ResultSink for VecSink {
    fn append(&mut self, entries: &[ErrorEntry]) -> Result<()> {
        if self.fail_appends {
            return Err(FileExporterError::Export("simulated failure".to_string()));
        }
        self.entries.extend_from_slice(entries);
        self.appends += 1;
        Ok(())
    }
}
