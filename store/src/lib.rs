//! Checkpoint Store - durable, append-only log of file modifications.
//!
//! Each checkpoint is one SQLite row plus one unified-diff blob on disk. The blob is
//! always written (temp file + rename) before the row that references it, so a crash
//! can leave an unreferenced blob but never a row pointing at a missing blob.
//! Opening the store reconciles any rows that break that rule anyway.
//!
//! Two implementations share the [`CheckpointLog`] interface:
//!
//! - [`SqliteCheckpointStore`]: the real store.
//! - [`DisabledCheckpointStore`]: used when the real store cannot be opened. Every
//!   operation fails with [`StoreError::Unavailable`], so callers degrade without
//!   scattered "is the store there?" checks.

mod clock;
mod disabled;
mod layout;
mod sqlite;
mod sqlite_util;

use std::io;
use std::path::{Path, PathBuf};

use rollback_types::{Checkpoint, CheckpointId, Coordinates, ToolType};
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disabled::DisabledCheckpointStore;
pub use layout::StoreLayout;
pub use sqlite::{ReconcileReport, SqliteCheckpointStore, StoreOptions};

/// Errors from checkpoint store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint store unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("checkpoint {id} not found")]
    NotFound { id: CheckpointId },
    #[error("checkpoint {id} is already resolved")]
    AlreadyResolved { id: CheckpointId },
    #[error("failed to write blob {}: {source}", path.display())]
    Blob {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { path: PathBuf },
    #[error("corrupt checkpoint row {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("checkpoint database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// The checkpoint log interface shared by the real and disabled stores.
///
/// Window queries follow one rule: the anchor is the earliest checkpoint of the
/// target message, and the window is every checkpoint of the session at or after
/// the anchor, newest first.
pub trait CheckpointLog: Send {
    /// Whether checkpoints are actually being recorded.
    fn is_enabled(&self) -> bool;

    /// Record a change whose final content is already known.
    fn create_resolved(
        &mut self,
        coords: &Coordinates,
        file_path: &Path,
        old_content: &str,
        new_content: &str,
        tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError>;

    /// Record a change whose final content will be known once the tool has run.
    fn create_pending(
        &mut self,
        coords: &Coordinates,
        file_path: &Path,
        old_content: &str,
        tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError>;

    /// Complete a pending checkpoint. Fails if it is unknown or already resolved.
    fn resolve(&mut self, id: CheckpointId, new_content: &str) -> Result<Checkpoint, StoreError>;

    /// Delete a checkpoint and its blob. Returns whether a row existed.
    fn delete(&mut self, id: CheckpointId) -> Result<bool, StoreError>;

    fn get(&self, id: CheckpointId) -> Result<Option<Checkpoint>, StoreError>;

    /// Checkpoints in the window anchored at `coords`, newest first.
    fn window(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError>;

    /// Whether the window anchored at `coords` is non-empty.
    fn has_window(&self, coords: &Coordinates) -> Result<bool, StoreError>;

    /// Checkpoints recorded for exactly `coords`, oldest first.
    fn for_message(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError>;

    /// Pending checkpoints recorded for exactly `coords`, oldest first.
    fn list_pending(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError>;

    /// Save a copy of a file's current bytes before it is rewritten.
    fn write_backup(&self, checkpoint: &Checkpoint, bytes: &[u8]) -> Result<PathBuf, StoreError>;
}
