use std::path::{Path, PathBuf};

use rollback_types::{Checkpoint, CheckpointId, Coordinates, ToolType};

use crate::{CheckpointLog, StoreError};

/// Stand-in used when the real store could not be opened.
///
/// Every operation fails with [`StoreError::Unavailable`]. Writes log a warning,
/// reads only log at debug since callers poll them freely.
#[derive(Debug, Clone)]
pub struct DisabledCheckpointStore {
    reason: String,
}

impl DisabledCheckpointStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn write_refused(&self, op: &'static str) -> StoreError {
        tracing::warn!(op, reason = %self.reason, "Checkpoint store disabled; change not recorded");
        self.unavailable()
    }

    fn read_refused(&self, op: &'static str) -> StoreError {
        tracing::debug!(op, reason = %self.reason, "Checkpoint store disabled");
        self.unavailable()
    }

    fn unavailable(&self) -> StoreError {
        StoreError::Unavailable {
            reason: self.reason.clone(),
        }
    }
}

impl CheckpointLog for DisabledCheckpointStore {
    fn is_enabled(&self) -> bool {
        false
    }

    fn create_resolved(
        &mut self,
        _coords: &Coordinates,
        _file_path: &Path,
        _old_content: &str,
        _new_content: &str,
        _tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError> {
        Err(self.write_refused("create_resolved"))
    }

    fn create_pending(
        &mut self,
        _coords: &Coordinates,
        _file_path: &Path,
        _old_content: &str,
        _tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError> {
        Err(self.write_refused("create_pending"))
    }

    fn resolve(&mut self, _id: CheckpointId, _new_content: &str) -> Result<Checkpoint, StoreError> {
        Err(self.write_refused("resolve"))
    }

    fn delete(&mut self, _id: CheckpointId) -> Result<bool, StoreError> {
        Err(self.write_refused("delete"))
    }

    fn get(&self, _id: CheckpointId) -> Result<Option<Checkpoint>, StoreError> {
        Err(self.read_refused("get"))
    }

    fn window(&self, _coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        Err(self.read_refused("window"))
    }

    fn has_window(&self, _coords: &Coordinates) -> Result<bool, StoreError> {
        Err(self.read_refused("has_window"))
    }

    fn for_message(&self, _coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        Err(self.read_refused("for_message"))
    }

    fn list_pending(&self, _coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        Err(self.read_refused("list_pending"))
    }

    fn write_backup(&self, _checkpoint: &Checkpoint, _bytes: &[u8]) -> Result<PathBuf, StoreError> {
        Err(self.write_refused("write_backup"))
    }
}
