// SPDX-License-Identifier: Apache-2.0

//! Receiver for fixed-stride transactional event logs (`.lgp`).
//!
//! Each run reads the day's log file from the last checkpoint, extracts the
//! records flagged as errors and appends them to a result file.
//!
//! Features:
//! - Line-offset checkpoints tied to the exact log file they belong to
//! - Incomplete trailing records are left for the next run
//! - Atomic checkpoint writes, with fallback to a legacy YAML checkpoint

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod persistence;
pub mod reader;

pub use classifier::{ERROR_MARKER, ErrorClassifier, ErrorEntry};
pub use config::ScannerConfig;
pub use coordinator::{RunCoordinator, RunMode, RunReport, RunState};
pub use error::{Error, Result};
pub use persistence::{
    Checkpoint, CheckpointStore, CheckpointStoreExt, JsonFileCheckpointStore, ResumePoint,
};
pub use reader::{RECORD_STRIDE, ReadOutcome, Record, RecordReader, START_OFFSET};
