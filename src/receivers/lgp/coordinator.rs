// SPDX-License-Identifier: Apache-2.0

//! Run coordinator.
//!
//! One run walks through a fixed sequence of stages:
//!
//! `ResolveTarget -> LoadCheckpoint -> Advance -> ReadLoop -> PersistCheckpoint -> Flush -> Done`
//!
//! Any failure moves the run to `Failed` before the checkpoint is written, so
//! a persisted checkpoint only ever covers records that were fully read and
//! classified. Results are appended only after the checkpoint is durable.
//!
//! A backfill scans an explicitly chosen day. Unless the stored checkpoint
//! already names that day's file it reads the file from the first record and
//! leaves the checkpoint alone, so the next scheduled run resumes where it
//! left off.
//!
//! At most one run may execute at a time; overlapping runs are not detected.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::exporters::file::ResultSink;
use crate::receivers::lgp::classifier::{ErrorClassifier, ErrorEntry};
use crate::receivers::lgp::config::ScannerConfig;
use crate::receivers::lgp::error::{Error, Result};
use crate::receivers::lgp::persistence::{Checkpoint, CheckpointStore, CheckpointStoreExt};
use crate::receivers::lgp::reader::{ReadOutcome, RecordReader};

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started yet
    Idle,
    ResolveTarget,
    LoadCheckpoint,
    Advance,
    ReadLoop,
    PersistCheckpoint,
    Flush,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ResolveTarget => "resolve_target",
            Self::LoadCheckpoint => "load_checkpoint",
            Self::Advance => "advance",
            Self::ReadLoop => "read_loop",
            Self::PersistCheckpoint => "persist_checkpoint",
            Self::Flush => "flush",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// How a run treats the stored checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Resume from the checkpoint and advance it
    Scheduled,
    /// Scan a chosen day; read-only unless the checkpoint names that file
    Backfill,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Position reached at the end of the run
    pub checkpoint: Checkpoint,
    /// Whether `checkpoint` was written to the store
    pub persisted: bool,
    /// Line offset the target file was resumed from
    pub start_offset: u64,
    /// Records read from the target file
    pub records: u64,
    /// Error entries appended, including those from a caught-up previous file
    pub errors: usize,
    /// Error entries taken from the previous file
    pub previous_errors: usize,
}

/// Records and errors found in one file
struct FileScan {
    entries: Vec<ErrorEntry>,
    end_offset: u64,
    records: u64,
}

/// RunCoordinator drives one scan of the day's log file
pub struct RunCoordinator<S, K> {
    config: ScannerConfig,
    store: S,
    sink: K,
    classifier: ErrorClassifier,
    state: RunState,
}

impl<S: CheckpointStore, K: ResultSink> RunCoordinator<S, K> {
    pub fn new(config: ScannerConfig, store: S, sink: K) -> Self {
        Self {
            config,
            store,
            sink,
            classifier: ErrorClassifier::new(),
            state: RunState::Idle,
        }
    }

    /// Current (or final) stage
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Scan the log file for `date`, resuming from and advancing the checkpoint.
    pub fn run(&mut self, date: NaiveDate) -> Result<RunReport> {
        self.run_with(date, RunMode::Scheduled)
    }

    /// Scan the log file for an explicitly chosen `date`.
    pub fn backfill(&mut self, date: NaiveDate) -> Result<RunReport> {
        self.run_with(date, RunMode::Backfill)
    }

    fn run_with(&mut self, date: NaiveDate, mode: RunMode) -> Result<RunReport> {
        match self.execute(date, mode) {
            Ok(report) => {
                self.transition(RunState::Done);
                info!(
                    file = %report.checkpoint.source_id,
                    mode = ?mode,
                    start_offset = report.start_offset,
                    end_offset = report.checkpoint.offset,
                    records = report.records,
                    errors = report.errors,
                    persisted = report.persisted,
                    "Run complete"
                );
                Ok(report)
            }
            Err(e) => {
                match &e {
                    Error::FileNotFound(path) => warn!(
                        stage = %self.state,
                        path = ?path,
                        "Log file does not exist, nothing to scan"
                    ),
                    _ => error!(stage = %self.state, error = %e, "Run failed"),
                }
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    fn execute(&mut self, date: NaiveDate, mode: RunMode) -> Result<RunReport> {
        self.transition(RunState::ResolveTarget);
        let target = self.config.log_path_for(date);
        if !target.is_file() {
            return Err(Error::FileNotFound(target));
        }
        let source_id = target.to_string_lossy().into_owned();
        debug!(file = %source_id, "Resolved log file");

        self.transition(RunState::LoadCheckpoint);
        let resume = self.store.load(&source_id)?;
        let start_offset = resume.offset;
        let persist = mode == RunMode::Scheduled || resume.resumed;
        debug!(file = %source_id, offset = start_offset, persist, "Loaded checkpoint");

        let mut entries = Vec::new();
        let previous = resume
            .previous
            .filter(|_| mode == RunMode::Scheduled && self.config.catch_up_previous)
            .filter(|cp| Path::new(&cp.source_id).is_file());
        if let Some(previous) = previous {
            let scan = self.scan(Path::new(&previous.source_id), previous.offset)?;
            info!(
                file = %previous.source_id,
                records = scan.records,
                errors = scan.entries.len(),
                "Previous log file read to end"
            );
            entries = scan.entries;
        }
        let previous_errors = entries.len();

        let scan = self.scan(&target, start_offset)?;
        info!(
            file = %source_id,
            records = scan.records,
            errors = scan.entries.len(),
            "Log file read to end"
        );
        entries.extend(scan.entries);

        let checkpoint = Checkpoint::new(source_id, scan.end_offset);
        if persist {
            self.transition(RunState::PersistCheckpoint);
            self.store.save(&checkpoint)?;
            info!(offset = checkpoint.offset, "Checkpoint saved");
        } else {
            info!(
                file = %checkpoint.source_id,
                "Backfill of a file other than the checkpointed one, checkpoint left unchanged"
            );
        }

        self.transition(RunState::Flush);
        self.sink.append(&entries)?;
        if !entries.is_empty() {
            info!(count = entries.len(), "Error entries appended");
        }

        Ok(RunReport {
            checkpoint,
            persisted: persist,
            start_offset,
            records: scan.records,
            errors: entries.len(),
            previous_errors,
        })
    }

    fn scan(&mut self, path: &Path, offset: u64) -> Result<FileScan> {
        let file = File::open(path)?;
        let mut reader = RecordReader::new(BufReader::new(file));

        self.transition(RunState::Advance);
        reader.advance_to(offset)?;

        self.transition(RunState::ReadLoop);
        let mut entries = Vec::new();
        let mut records = 0;
        loop {
            let record = match reader.next_record()? {
                ReadOutcome::Record(record) => record,
                ReadOutcome::EndOfStream => break,
            };
            records += 1;

            if let Some(entry) = self.classifier.classify(&record)? {
                debug!(line = record.start_line(), message = %entry.message, "Error record");
                entries.push(entry);
            }
        }

        Ok(FileScan {
            entries,
            end_offset: reader.position(),
            records,
        })
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Run state transition");
        self.state = next;
    }
}
