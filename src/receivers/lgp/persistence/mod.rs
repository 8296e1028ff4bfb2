// SPDX-License-Identifier: Apache-2.0

//! Persistence for the scan checkpoint.
//!
//! Uses JSON file storage with atomic writes for reliable resume positions.

mod json_file;
mod schema;
mod store;

pub use json_file::JsonFileCheckpointStore;
pub use schema::{PERSISTED_CHECKPOINT_VERSION, PersistedCheckpointV0, PersistedCheckpointV1};
#[cfg(test)]
pub use store::MemoryCheckpointStore;
pub use store::{Checkpoint, CheckpointStore, CheckpointStoreExt, ResumePoint};
