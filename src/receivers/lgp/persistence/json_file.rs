// SPDX-License-Identifier: Apache-2.0

//! JSON file-based checkpoint store with atomic writes.
//!
//! The checkpoint lives in a single JSON document that is fully replaced on
//! every save using a write-to-temp-then-rename strategy, so a crash leaves
//! either the old or the new checkpoint on disk, never a mix.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::receivers::lgp::error::{Error, Result};
use crate::receivers::lgp::persistence::schema::{
    PERSISTED_CHECKPOINT_VERSION, PersistedCheckpointV0, PersistedCheckpointV1,
};
use crate::receivers::lgp::persistence::{Checkpoint, CheckpointStore};

/// A checkpoint store backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    path: PathBuf,
    /// YAML checkpoint written by earlier deployments, read only when the
    /// JSON checkpoint does not exist yet
    legacy_path: Option<PathBuf>,
}

impl JsonFileCheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            legacy_path: None,
        }
    }

    /// Fall back to a legacy YAML checkpoint at `path`
    pub fn with_legacy_path(mut self, path: impl AsRef<Path>) -> Self {
        self.legacy_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the stored checkpoint. Returns false if there was none.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Persistence(format!(
                "failed to remove checkpoint {:?}: {}",
                self.path, e
            ))),
        }
    }

    fn read_current(&self) -> Result<Option<Checkpoint>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "failed to open checkpoint {:?}: {}",
                    self.path, e
                )));
            }
        };

        let persisted: PersistedCheckpointV1 = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| {
                Error::Persistence(format!("failed to parse checkpoint {:?}: {}", self.path, e))
            })?;

        if persisted.version > PERSISTED_CHECKPOINT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported checkpoint version {} in {:?}",
                persisted.version, self.path
            )));
        }

        Ok(Some(persisted.into()))
    }

    fn read_legacy(&self) -> Result<Option<Checkpoint>> {
        let Some(legacy_path) = &self.legacy_path else {
            return Ok(None);
        };

        let file = match File::open(legacy_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "failed to open legacy checkpoint {:?}: {}",
                    legacy_path, e
                )));
            }
        };

        let v0: PersistedCheckpointV0 =
            serde_yaml::from_reader(BufReader::new(file)).map_err(|e| {
                Error::Persistence(format!(
                    "failed to parse legacy checkpoint {:?}: {}",
                    legacy_path, e
                ))
            })?;

        info!(
            path = ?legacy_path,
            curr_log = %v0.curr_log,
            curr_row = v0.curr_row,
            "Using legacy checkpoint"
        );

        Ok(Some(v0.into()))
    }
}

impl CheckpointStore for JsonFileCheckpointStore {
    fn get(&self) -> Result<Option<Checkpoint>> {
        match self.read_current()? {
            Some(checkpoint) => Ok(Some(checkpoint)),
            None => self.read_legacy(),
        }
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        atomic_write(&self.path, &PersistedCheckpointV1::new(checkpoint))?;
        debug!(
            path = ?self.path,
            source_id = %checkpoint.source_id,
            offset = checkpoint.offset,
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Write state to file atomically (write to temp, then rename)
fn atomic_write<T: Serialize>(path: &Path, state: &T) -> Result<()> {
    use portable_atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    // Ensure parent directory exists
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Persistence(format!("failed to create parent directory: {}", e))
            })?;
        }
    }

    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let file = File::create(&temp_path)
        .map_err(|e| Error::Persistence(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, state)
        .map_err(|e| Error::Persistence(format!("failed to write checkpoint: {}", e)))?;

    let file = writer
        .into_inner()
        .map_err(|e| Error::Persistence(format!("failed to flush checkpoint: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::Persistence(format!("failed to sync checkpoint: {}", e)))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Persistence(format!(
            "failed to rename checkpoint file: {}",
            e
        )));
    }

    // The rename is only durable once the directory entry is
    #[cfg(unix)]
    {
        let dir = parent.unwrap_or_else(|| Path::new("."));
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| Error::Persistence(format!("failed to sync directory: {}", e)))?;
    }

    Ok(())
}
