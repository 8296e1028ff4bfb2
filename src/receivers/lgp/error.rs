// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

use crate::exporters::file::FileExporterError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Stream truncated: expected at least {expected} lines, found {available}")]
    TruncatedStream { expected: u64, available: u64 },

    #[error("Cannot rewind reader from line {position} to line {offset}")]
    Rewind { position: u64, offset: u64 },

    #[error("Decode error at line {line}: {reason}")]
    Decode { line: u64, reason: String },

    #[error("Export error: {0}")]
    Export(#[from] FileExporterError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::FileNotFound(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
