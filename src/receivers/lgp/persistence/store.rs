// SPDX-License-Identifier: Apache-2.0

use crate::receivers::lgp::error::Result;
use crate::receivers::lgp::reader::START_OFFSET;

/// Resume position: a physical line offset within one log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Identifies the log file the offset applies to
    pub source_id: String,
    /// Physical lines consumed
    pub offset: u64,
}

impl Checkpoint {
    pub fn new(source_id: impl Into<String>, offset: u64) -> Self {
        Self {
            source_id: source_id.into(),
            offset,
        }
    }

    /// A checkpoint at the first record of `source_id`
    pub fn start_of(source_id: impl Into<String>) -> Self {
        Self::new(source_id, START_OFFSET)
    }
}

/// Storage for the single persisted checkpoint.
pub trait CheckpointStore {
    /// Read the stored checkpoint, if any.
    fn get(&self) -> Result<Option<Checkpoint>>;

    /// Replace the stored checkpoint. Must be durable when it returns.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Where a run resumes, derived from a single read of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Line offset to resume the expected file from
    pub offset: u64,
    /// Whether the stored checkpoint names the expected file
    pub resumed: bool,
    /// Stored checkpoint naming some other file
    pub previous: Option<Checkpoint>,
}

/// Extension trait resolving resume offsets
pub trait CheckpointStoreExt: CheckpointStore {
    /// Resume point for `expected_source_id`.
    ///
    /// A checkpoint for another file is stale and yields [`START_OFFSET`], as
    /// does a missing checkpoint. The stale checkpoint is handed back in
    /// `previous`.
    fn load(&self, expected_source_id: &str) -> Result<ResumePoint> {
        Ok(match self.get()? {
            Some(cp) if cp.source_id == expected_source_id => ResumePoint {
                offset: cp.offset,
                resumed: true,
                previous: None,
            },
            stored => ResumePoint {
                offset: START_OFFSET,
                resumed: false,
                previous: stored,
            },
        })
    }
}

// Blanket implementation
impl<T: CheckpointStore + ?Sized> CheckpointStoreExt for T {}

/// In-memory store for testing
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoint: Option<Checkpoint>,
    pub gets: std::cell::Cell<usize>,
    pub saves: usize,
    pub fail_saves: bool,
}

#[cfg(test)]
impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self) -> Result<Option<Checkpoint>> {
        self.gets.set(self.gets.get() + 1);
        Ok(self.checkpoint.clone())
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if self.fail_saves {
            return Err(crate::receivers::lgp::error::Error::Persistence(
                "simulated write failure".to_string(),
            ));
        }
        self.checkpoint = Some(checkpoint.clone());
        self.saves += 1;
        Ok(())
    }
}
