//! Checkpoint engine for Rollback.
//!
//! Ties the classifier, the checkpoint store, the pending-update resolver and the
//! revert engine together behind [`CheckpointEngine`]. The engine is synchronous;
//! async hosts go through [`EngineHandle`].

mod classifier;
mod config;
mod handle;
mod resolver;
mod revert;

use std::path::{Path, PathBuf};

use rollback_store::{
    CheckpointLog, DisabledCheckpointStore, SqliteCheckpointStore, StoreError, StoreLayout,
    StoreOptions,
};
use rollback_types::{
    Checkpoint, CheckpointId, CoordinateError, Coordinates, RevertReport, ToolInvocation,
};
use thiserror::Error;

pub use classifier::{CheckpointPlan, ClassifyError, PlannedChange, classify, read_existing};
pub use config::{ConfigError, DISABLED_ENV, RevertConfig, RollbackConfig, StoreConfig};
pub use handle::EngineHandle;
pub use resolver::{ResolveError, ResolveOutcome};
pub use revert::{RevertOptions, effective_checkpoints};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Coordinates(#[from] CoordinateError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("checkpoint worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Checkpointing for one project.
pub struct CheckpointEngine {
    project_root: PathBuf,
    store: Box<dyn CheckpointLog>,
    revert_options: RevertOptions,
}

impl CheckpointEngine {
    /// Open the project's checkpoint store.
    ///
    /// Never fails: if the store cannot be opened the engine runs with a disabled
    /// store, recording nothing and refusing reverts.
    pub fn open(project_root: impl Into<PathBuf>, config: &RollbackConfig) -> Self {
        let project_root = absolute_root(project_root.into());
        let store_config = config.store_config();

        let store: Box<dyn CheckpointLog> = if store_config.enabled {
            let layout = StoreLayout::for_project(&project_root, &store_config.dir);
            let options = StoreOptions {
                sync_writes: store_config.sync_writes,
            };
            match SqliteCheckpointStore::open_with_options(layout, options) {
                Ok(store) => {
                    let reconciled = store.reconcile_report();
                    if reconciled.removed_rows > 0 {
                        tracing::warn!(
                            removed = reconciled.removed_rows,
                            "Dropped checkpoints whose patch blobs were missing"
                        );
                    }
                    Box::new(store)
                }
                Err(e) => {
                    tracing::warn!(
                        project = %project_root.display(),
                        "Checkpoint store unavailable, continuing without checkpoints: {e:#}"
                    );
                    Box::new(DisabledCheckpointStore::new(format!("{e:#}")))
                }
            }
        } else {
            tracing::warn!(
                project = %project_root.display(),
                "Checkpointing disabled by configuration"
            );
            Box::new(DisabledCheckpointStore::new("disabled by configuration"))
        };

        Self::with_store(project_root, store).with_revert_options(RevertOptions {
            backups: config.backups_enabled(),
        })
    }

    /// Use an already-open store.
    ///
    /// A relative `project_root` is resolved against the current directory here,
    /// so recorded paths stay valid after the process changes directory.
    pub fn with_store(project_root: impl Into<PathBuf>, store: Box<dyn CheckpointLog>) -> Self {
        Self {
            project_root: absolute_root(project_root.into()),
            store,
            revert_options: RevertOptions::default(),
        }
    }

    #[must_use]
    pub fn with_revert_options(mut self, options: RevertOptions) -> Self {
        self.revert_options = options;
        self
    }

    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    /// Checkpoint the file a tool invocation is about to modify.
    ///
    /// Returns the new checkpoint's id, or `None` when the tool does not modify
    /// files or the store is disabled. Must be called before the tool runs, while
    /// the file still holds its old content.
    pub fn record_tool_call(
        &mut self,
        coords: &Coordinates,
        invocation: &ToolInvocation,
    ) -> Result<Option<CheckpointId>, EngineError> {
        let Some(plan) = classify(invocation, &self.project_root)? else {
            return Ok(None);
        };
        let old_content = read_existing(&plan.file_path)?;

        let created = match &plan.change {
            PlannedChange::Replace { content } => self.store.create_resolved(
                coords,
                &plan.file_path,
                &old_content,
                content,
                plan.tool_type,
            ),
            PlannedChange::Deferred => {
                self.store
                    .create_pending(coords, &plan.file_path, &old_content, plan.tool_type)
            }
        };

        match created {
            Ok(id) => Ok(Some(id)),
            Err(e) if e.is_unavailable() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Complete a pending checkpoint from the file's content on disk.
    pub fn resolve_pending(
        &mut self,
        id: CheckpointId,
        file_path: &Path,
    ) -> Result<ResolveOutcome, EngineError> {
        Ok(resolver::resolve_pending(self.store.as_mut(), id, file_path)?)
    }

    /// Complete every pending checkpoint of one assistant turn.
    pub fn resolve_pending_for_message(
        &mut self,
        coords: &Coordinates,
    ) -> Result<Vec<ResolveOutcome>, EngineError> {
        Ok(resolver::resolve_pending_for_message(
            self.store.as_mut(),
            coords,
        )?)
    }

    pub fn list_pending(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.store.list_pending(coords)?)
    }

    /// Checkpoints recorded for exactly this message, oldest first.
    pub fn list_checkpoints(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.store.for_message(coords)?)
    }

    /// Checkpoints a revert at this message covers, newest first.
    ///
    /// Includes every later message of the session, the same window
    /// [`revert`](Self::revert) and [`has_file_changes`](Self::has_file_changes) use.
    pub fn window_checkpoints(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.store.window(coords)?)
    }

    /// Whether reverting at this message would touch any file.
    pub fn has_file_changes(&self, coords: &Coordinates) -> Result<bool, EngineError> {
        Ok(self.store.has_window(coords)?)
    }

    pub fn revert(&self, coords: &Coordinates) -> Result<RevertReport, EngineError> {
        Ok(revert::revert(
            self.store.as_ref(),
            coords,
            self.revert_options,
        )?)
    }

    pub fn unrevert(&self, coords: &Coordinates) -> Result<RevertReport, EngineError> {
        Ok(revert::unrevert(
            self.store.as_ref(),
            coords,
            self.revert_options,
        )?)
    }
}

fn absolute_root(root: PathBuf) -> PathBuf {
    std::path::absolute(&root).unwrap_or(root)
}
