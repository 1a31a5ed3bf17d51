//! Revert and unrevert over a checkpoint window.
//!
//! The window anchored at a message is every checkpoint of its session from that
//! message's first checkpoint onward. Only the latest checkpoint of each file in
//! the window is applied: revert writes back its `old_content`, unrevert its
//! `new_content`. Earlier changes to the same file inside the window are not
//! undone separately.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use rollback_store::{CheckpointLog, StoreError};
use rollback_types::{
    Checkpoint, CheckpointContent, Coordinates, FileFailure, RevertDirection, RevertReport,
};
use rollback_utils::{AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write_with_options};

#[derive(Debug, Clone, Copy)]
pub struct RevertOptions {
    /// Back up each file's current bytes before rewriting it.
    pub backups: bool,
}

impl Default for RevertOptions {
    fn default() -> Self {
        Self { backups: true }
    }
}

/// Latest checkpoint per file from a newest-first window, in first-appearance order.
#[must_use]
pub fn effective_checkpoints(window: Vec<Checkpoint>) -> Vec<Checkpoint> {
    let mut seen = HashSet::new();
    window
        .into_iter()
        .filter(|checkpoint| seen.insert(checkpoint.file_path.clone()))
        .collect()
}

/// Restore every file touched in the window to its content before the window.
pub fn revert(
    store: &dyn CheckpointLog,
    coords: &Coordinates,
    options: RevertOptions,
) -> Result<RevertReport, StoreError> {
    let targets = effective_checkpoints(store.window(coords)?);
    let mut report = RevertReport::new(RevertDirection::Revert);

    for checkpoint in &targets {
        if options.backups {
            backup_current(store, checkpoint);
        }
        let result = if checkpoint.created_file() {
            remove_if_exists(&checkpoint.file_path)
        } else {
            restore_file(&checkpoint.file_path, checkpoint.old_content.as_bytes())
        };
        record(&mut report, checkpoint, result);
    }

    log_report(coords, &report);
    Ok(report)
}

/// Re-apply the content every file in the window had after its latest change.
pub fn unrevert(
    store: &dyn CheckpointLog,
    coords: &Coordinates,
    options: RevertOptions,
) -> Result<RevertReport, StoreError> {
    let targets = effective_checkpoints(store.window(coords)?);
    let mut report = RevertReport::new(RevertDirection::Unrevert);

    for checkpoint in &targets {
        let result = match &checkpoint.new_content {
            // Final content unknown: the tool's edit is assumed to still be on disk.
            CheckpointContent::Pending => {
                tracing::debug!(
                    checkpoint = %checkpoint.id,
                    path = %checkpoint.file_path.display(),
                    "Checkpoint still pending; nothing to re-apply"
                );
                Ok(())
            }
            // Empty resolved content still produces the (empty) file.
            CheckpointContent::Resolved(content) => {
                if options.backups {
                    backup_current(store, checkpoint);
                }
                restore_file(&checkpoint.file_path, content.as_bytes())
            }
        };
        record(&mut report, checkpoint, result);
    }

    log_report(coords, &report);
    Ok(report)
}

fn record(report: &mut RevertReport, checkpoint: &Checkpoint, result: io::Result<()>) {
    match result {
        Ok(()) => report.succeeded.push(checkpoint.file_path.clone()),
        Err(e) => {
            tracing::warn!(
                direction = %report.direction,
                path = %checkpoint.file_path.display(),
                "Failed to rewrite file: {e}"
            );
            report.failed.push(FileFailure {
                path: checkpoint.file_path.clone(),
                error: e.to_string(),
            });
        }
    }
}

fn log_report(coords: &Coordinates, report: &RevertReport) {
    if report.failed.is_empty() {
        tracing::info!(coords = %coords, "{}", report.summary_line());
    } else {
        tracing::warn!(coords = %coords, "{}", report.summary_line());
    }
}

/// Best effort: a failed backup never blocks the rewrite.
fn backup_current(store: &dyn CheckpointLog, checkpoint: &Checkpoint) {
    let bytes = match std::fs::read(&checkpoint.file_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::debug!(path = %checkpoint.file_path.display(), "Skipping backup: {e}");
            return;
        }
    };
    match store.write_backup(checkpoint, &bytes) {
        Ok(path) => tracing::debug!(backup = %path.display(), "Backed up file before rewrite"),
        Err(e) => tracing::debug!(path = %checkpoint.file_path.display(), "Backup failed: {e}"),
    }
}

fn restore_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    // Refuse to overwrite directories.
    if let Ok(meta) = std::fs::metadata(path)
        && meta.is_dir()
    {
        return Err(io::Error::other(format!(
            "Refusing to overwrite directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    atomic_write_with_options(
        path,
        bytes,
        AtomicWriteOptions {
            file_sync: FileSyncPolicy::SyncAll,
            mode: PersistMode::preserving(path),
        },
    )
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(io::Error::other(format!(
            "Refusing to remove directory: {}",
            path.display()
        ))),
        Ok(_meta) => match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
