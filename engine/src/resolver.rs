//! Completion of two-phase checkpoints.
//!
//! Once a deferred tool has run, its target file is read back and the pending
//! checkpoint receives the final content. If the file cannot be read the
//! checkpoint can never be completed, so it is deleted (an orphan).

use std::path::{Path, PathBuf};

use rollback_store::{CheckpointLog, StoreError};
use rollback_types::{Checkpoint, CheckpointId, Coordinates};
use rollback_utils::diff_stats;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("checkpoint {id} not found")]
    NotFound { id: CheckpointId },
    #[error("checkpoint {id} is already resolved")]
    AlreadyResolved { id: CheckpointId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The checkpoint now carries the file's final content.
    Resolved(Checkpoint),
    /// The final content could not be read; the checkpoint was deleted.
    Orphaned {
        id: CheckpointId,
        path: PathBuf,
        reason: String,
    },
}

impl ResolveOutcome {
    #[must_use]
    pub fn id(&self) -> CheckpointId {
        match self {
            Self::Resolved(checkpoint) => checkpoint.id,
            Self::Orphaned { id, .. } => *id,
        }
    }
}

/// Read `file_path` back and complete pending checkpoint `id` with its content.
///
/// The stored path is authoritative; a differing `file_path` is only logged.
pub fn resolve_pending(
    store: &mut dyn CheckpointLog,
    id: CheckpointId,
    file_path: &Path,
) -> Result<ResolveOutcome, ResolveError> {
    let checkpoint = store.get(id)?.ok_or(ResolveError::NotFound { id })?;
    if !checkpoint.is_pending() {
        return Err(ResolveError::AlreadyResolved { id });
    }
    if checkpoint.file_path != file_path {
        tracing::warn!(
            checkpoint = %id,
            stored = %checkpoint.file_path.display(),
            given = %file_path.display(),
            "Resolve path differs from checkpoint; using stored path"
        );
    }

    let content = match read_final(&checkpoint.file_path) {
        Ok(content) => content,
        Err(reason) => return orphan(store, checkpoint, reason),
    };

    match store.resolve(id, &content) {
        Ok(resolved) => {
            let stats = diff_stats(&resolved.old_content, &content);
            tracing::info!(
                checkpoint = %id,
                path = %resolved.file_path.display(),
                additions = stats.additions,
                deletions = stats.deletions,
                "Pending checkpoint resolved"
            );
            Ok(ResolveOutcome::Resolved(resolved))
        }
        Err(StoreError::AlreadyResolved { id }) => Err(ResolveError::AlreadyResolved { id }),
        Err(StoreError::NotFound { id }) => Err(ResolveError::NotFound { id }),
        Err(e) if e.is_unavailable() => Err(e.into()),
        Err(e) => orphan(store, checkpoint, e.to_string()),
    }
}

/// Resolve every pending checkpoint recorded for `coords`, oldest first.
pub fn resolve_pending_for_message(
    store: &mut dyn CheckpointLog,
    coords: &Coordinates,
) -> Result<Vec<ResolveOutcome>, ResolveError> {
    let pending = store.list_pending(coords)?;
    let mut outcomes = Vec::with_capacity(pending.len());
    for checkpoint in pending {
        outcomes.push(resolve_pending(store, checkpoint.id, &checkpoint.file_path)?);
    }
    Ok(outcomes)
}

fn orphan(
    store: &mut dyn CheckpointLog,
    checkpoint: Checkpoint,
    reason: String,
) -> Result<ResolveOutcome, ResolveError> {
    tracing::warn!(
        checkpoint = %checkpoint.id,
        path = %checkpoint.file_path.display(),
        %reason,
        "Could not complete pending checkpoint; deleting it"
    );
    store.delete(checkpoint.id)?;
    Ok(ResolveOutcome::Orphaned {
        id: checkpoint.id,
        path: checkpoint.file_path,
        reason,
    })
}

fn read_final(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|_| "content is not valid UTF-8".to_string())
}
