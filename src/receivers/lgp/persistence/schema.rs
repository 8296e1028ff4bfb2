// SPDX-License-Identifier: Apache-2.0

//! Persistence schema definitions for the scan checkpoint.
//!
//! This module defines the versioned schemas for the persisted checkpoint.
//! Currently supports:
//! - v0: Legacy YAML document `{curr_log, curr_row}` (no version field)
//! - v1: JSON document with a version field and the time of the last update

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::receivers::lgp::persistence::Checkpoint;

/// Current schema version for the persisted checkpoint
pub const PERSISTED_CHECKPOINT_VERSION: u8 = 1;

/// Legacy checkpoint (v0, YAML, no version field)
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedCheckpointV0 {
    /// Path of the log file the row applies to
    pub curr_log: String,
    /// Physical line offset to resume from
    pub curr_row: u64,
}

/// Persisted checkpoint (v1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCheckpointV1 {
    /// Schema version (always 1 for this format)
    pub version: u8,
    /// Path of the log file the row applies to
    pub curr_log: String,
    /// Physical line offset to resume from
    pub curr_row: u64,
    /// When the checkpoint was written (for operator visibility)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistedCheckpointV1 {
    pub fn new(checkpoint: &Checkpoint) -> Self {
        Self {
            version: PERSISTED_CHECKPOINT_VERSION,
            curr_log: checkpoint.source_id.clone(),
            curr_row: checkpoint.offset,
            updated_at: Some(Utc::now()),
        }
    }
}

impl From<PersistedCheckpointV0> for Checkpoint {
    fn from(v0: PersistedCheckpointV0) -> Self {
        Checkpoint::new(v0.curr_log, v0.curr_row)
    }
}

impl From<PersistedCheckpointV1> for Checkpoint {
    fn from(v1: PersistedCheckpointV1) -> Self {
        Checkpoint::new(v1.curr_log, v1.curr_row)
    }
}
