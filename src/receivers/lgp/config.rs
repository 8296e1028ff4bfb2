// SPDX-License-Identifier: Apache-2.0

//! Configuration for the log scanner.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::exporters::file::ResultFormat;

/// Extension of daily log files
pub const LOG_FILE_EXTENSION: &str = "lgp";

/// Configuration for one scan run
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Directory holding the dated log files
    pub log_directory: PathBuf,
    /// Append-only result file
    pub result_file: PathBuf,
    /// Encoding of the result file
    pub result_format: ResultFormat,
    /// Checkpoint location (outside the log directory)
    pub checkpoint_file: PathBuf,
    /// YAML checkpoint left by earlier deployments
    pub legacy_checkpoint_file: Option<PathBuf>,
    /// Finish the previously checkpointed file before starting a new one
    pub catch_up_previous: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
            result_file: PathBuf::from("errors.txt"),
            result_format: ResultFormat::Text,
            checkpoint_file: PathBuf::from("workdata.json"),
            legacy_checkpoint_file: None,
            catch_up_previous: false,
        }
    }
}

impl ScannerConfig {
    /// File name of the log for `date`: `<YYYYMMDD>000000.lgp`
    pub fn log_file_name(date: NaiveDate) -> String {
        format!("{}000000.{}", date.format("%Y%m%d"), LOG_FILE_EXTENSION)
    }

    /// Full path of the log for `date`
    pub fn log_path_for(&self, date: NaiveDate) -> PathBuf {
        self.log_directory.join(Self::log_file_name(date))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.log_directory.as_os_str().is_empty() {
            return Err("log_directory must not be empty".to_string());
        }

        if self.result_file.as_os_str().is_empty() {
            return Err("result_file must not be empty".to_string());
        }

        if self.checkpoint_file.as_os_str().is_empty() {
            return Err("checkpoint_file must not be empty".to_string());
        }

        let log_directory = resolve(&self.log_directory)
            .map_err(|e| format!("cannot resolve log_directory {:?}: {}", self.log_directory, e))?;
        let checkpoint_file = resolve(&self.checkpoint_file).map_err(|e| {
            format!("cannot resolve checkpoint_file {:?}: {}", self.checkpoint_file, e)
        })?;
        if checkpoint_file.starts_with(&log_directory) {
            return Err(format!(
                "checkpoint_file {:?} must be stored outside log_directory {:?}",
                self.checkpoint_file, self.log_directory
            ));
        }

        Ok(())
    }
}

/// Absolute form of `path` with symlinks and `..` resolved for the part of
/// it that exists.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    if let Ok(canonical) = absolute.canonicalize() {
        return Ok(canonical);
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve(parent)?.join(name)),
        _ => Ok(absolute),
    }
}
