//! SQLite-backed checkpoint store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rollback_types::{
    Checkpoint, CheckpointContent, CheckpointId, Coordinates, MessageId, SessionId, Timestamp,
    ToolType,
};
use rollback_utils::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write_with_options, pending_patch,
    remove_stale_temp_files, unified_patch,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::clock::{Clock, SystemClock};
use crate::layout::StoreLayout;
use crate::sqlite_util::{ensure_secure_dir, open_secure_db};
use crate::{CheckpointLog, StoreError};

const SELECT_CHECKPOINT: &str = "SELECT id, session_id, message_id, file_path, timestamp,
        patch_path, full_snapshot, old_content, new_content, tool_type
    FROM checkpoints";

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// fsync blobs before they are renamed into place.
    pub sync_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { sync_writes: true }
    }
}

/// What the startup reconciliation pass cleaned up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows deleted because their patch blob was missing.
    pub removed_rows: usize,
    /// Temp files left by interrupted blob writes.
    pub removed_temp_files: usize,
}

/// Durable checkpoint log for one project.
pub struct SqliteCheckpointStore {
    db: Connection,
    layout: StoreLayout,
    options: StoreOptions,
    clock: Box<dyn Clock>,
    /// Last timestamp handed out; new checkpoints always sort after it.
    last_timestamp: Timestamp,
    reconciled: ReconcileReport,
}

impl SqliteCheckpointStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS checkpoints (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            message_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            patch_path TEXT NOT NULL,
            full_snapshot INTEGER NOT NULL,
            old_content TEXT NOT NULL,
            new_content TEXT,
            tool_type TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_checkpoints_session_ts
        ON checkpoints(session_id, timestamp);

        CREATE INDEX IF NOT EXISTS idx_checkpoints_message
        ON checkpoints(session_id, message_id);
    ";

    /// Open or create the store described by `layout`.
    pub fn open(layout: StoreLayout) -> Result<Self> {
        Self::open_with_options(layout, StoreOptions::default())
    }

    pub fn open_with_options(layout: StoreLayout, options: StoreOptions) -> Result<Self> {
        let db = open_secure_db(&layout.db_path())?;
        ensure_secure_dir(&layout.blob_dir())?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create checkpoint schema")?;

        let last: Option<i64> = db
            .query_row("SELECT MAX(timestamp) FROM checkpoints", [], |row| row.get(0))
            .context("Failed to read latest checkpoint timestamp")?;

        let mut store = Self {
            db,
            layout,
            options,
            clock: Box::new(SystemClock),
            last_timestamp: Timestamp::from_millis(last.unwrap_or(i64::MIN)),
            reconciled: ReconcileReport::default(),
        };
        store.reconciled = store
            .reconcile()
            .context("Failed to reconcile checkpoint store")?;
        Ok(store)
    }

    /// Replace the clock used for checkpoint timestamps and backup names.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Result of the reconciliation pass run when the store was opened.
    #[must_use]
    pub fn reconcile_report(&self) -> ReconcileReport {
        self.reconciled
    }

    /// Delete rows whose patch blob is missing and sweep temp-file debris.
    ///
    /// After this returns, no row references a missing blob.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, StoreError> {
        let rows: Vec<(String, String)> = {
            let mut stmt = self.db.prepare("SELECT id, patch_path FROM checkpoints")?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?
        };

        let mut removed_rows = 0;
        for (id, patch_path) in rows {
            if Path::new(&patch_path).is_file() {
                continue;
            }
            self.db
                .execute("DELETE FROM checkpoints WHERE id = ?1", params![id])?;
            removed_rows += 1;
            tracing::warn!(
                checkpoint = %id,
                patch = %patch_path,
                "Removed checkpoint whose patch blob is missing"
            );
        }

        let blob_dir = self.layout.blob_dir();
        let removed_temp_files =
            remove_stale_temp_files(&blob_dir).map_err(|source| StoreError::Blob {
                path: blob_dir.clone(),
                source,
            })?;
        if removed_temp_files > 0 {
            tracing::debug!(count = removed_temp_files, "Removed stale blob temp files");
        }

        Ok(ReconcileReport {
            removed_rows,
            removed_temp_files,
        })
    }

    fn next_timestamp(&mut self) -> Timestamp {
        let now = self.clock.now();
        let ts = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp.next()
        };
        self.last_timestamp = ts;
        ts
    }

    fn write_blob(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let file_sync = if self.options.sync_writes {
            FileSyncPolicy::SyncAll
        } else {
            FileSyncPolicy::SkipSync
        };
        let options = AtomicWriteOptions {
            file_sync,
            mode: PersistMode::OwnerOnly,
        };
        atomic_write_with_options(path, bytes, options).map_err(|source| StoreError::Blob {
            path: path.to_path_buf(),
            source,
        })
    }

    fn insert(
        &mut self,
        coords: &Coordinates,
        file_path: &Path,
        old_content: &str,
        new_content: &CheckpointContent,
        tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError> {
        let file_str = path_str(file_path)?;
        let id = CheckpointId::generate();
        let patch_path = self.layout.patch_path(id);
        let patch_str = path_str(&patch_path)?;

        let patch = match new_content {
            CheckpointContent::Resolved(new) => unified_patch(file_str, old_content, new),
            CheckpointContent::Pending => pending_patch(file_str),
        };
        // Blob first: a failure here must leave no row behind.
        self.write_blob(&patch_path, patch.as_bytes())?;

        let timestamp = self.next_timestamp();
        let full_snapshot = old_content.is_empty() || tool_type.is_full_replacement();
        let inserted = self.db.execute(
            "INSERT INTO checkpoints (id, session_id, message_id, file_path, timestamp,
                patch_path, full_snapshot, old_content, new_content, tool_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.to_string(),
                coords.session.as_str(),
                coords.message.as_str(),
                file_str,
                timestamp.as_millis(),
                patch_str,
                full_snapshot,
                old_content,
                new_content.as_column(),
                tool_type.as_str(),
            ],
        );
        if let Err(e) = inserted {
            let _ = fs::remove_file(&patch_path);
            return Err(e.into());
        }

        tracing::info!(
            checkpoint = %id,
            coords = %coords,
            path = %file_path.display(),
            tool = %tool_type,
            pending = new_content.is_pending(),
            "Checkpoint created"
        );
        Ok(id)
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Checkpoint>, StoreError> {
        let mut stmt = self.db.prepare(sql)?;
        let rows = stmt.query_map(params, RawCheckpoint::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_checkpoint()?);
        }
        Ok(out)
    }
}

impl CheckpointLog for SqliteCheckpointStore {
    fn is_enabled(&self) -> bool {
        true
    }

    fn create_resolved(
        &mut self,
        coords: &Coordinates,
        file_path: &Path,
        old_content: &str,
        new_content: &str,
        tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError> {
        let content = CheckpointContent::Resolved(new_content.to_string());
        self.insert(coords, file_path, old_content, &content, tool_type)
    }

    fn create_pending(
        &mut self,
        coords: &Coordinates,
        file_path: &Path,
        old_content: &str,
        tool_type: ToolType,
    ) -> Result<CheckpointId, StoreError> {
        self.insert(
            coords,
            file_path,
            old_content,
            &CheckpointContent::Pending,
            tool_type,
        )
    }

    fn resolve(&mut self, id: CheckpointId, new_content: &str) -> Result<Checkpoint, StoreError> {
        let checkpoint = self.get(id)?.ok_or(StoreError::NotFound { id })?;
        if !checkpoint.is_pending() {
            return Err(StoreError::AlreadyResolved { id });
        }

        let name = path_str(&checkpoint.file_path)?;
        let patch = unified_patch(name, &checkpoint.old_content, new_content);
        let patch_path = self.layout.patch_path(id);
        let patch_str = path_str(&patch_path)?;
        self.write_blob(&patch_path, patch.as_bytes())?;

        let updated = self.db.execute(
            "UPDATE checkpoints SET new_content = ?1, patch_path = ?2
             WHERE id = ?3 AND new_content IS NULL",
            params![new_content, patch_str, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::AlreadyResolved { id });
        }

        tracing::info!(
            checkpoint = %id,
            path = %checkpoint.file_path.display(),
            "Checkpoint resolved"
        );
        Ok(Checkpoint {
            patch_path,
            new_content: CheckpointContent::Resolved(new_content.to_string()),
            ..checkpoint
        })
    }

    fn delete(&mut self, id: CheckpointId) -> Result<bool, StoreError> {
        let patch_path: Option<String> = self
            .db
            .query_row(
                "SELECT patch_path FROM checkpoints WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(patch_path) = patch_path else {
            return Ok(false);
        };

        self.db.execute(
            "DELETE FROM checkpoints WHERE id = ?1",
            params![id.to_string()],
        )?;
        if let Err(e) = fs::remove_file(&patch_path)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::debug!(patch = %patch_path, "Failed to remove patch blob: {e}");
        }
        Ok(true)
    }

    fn get(&self, id: CheckpointId) -> Result<Option<Checkpoint>, StoreError> {
        let mut found = self.query(
            &format!("{SELECT_CHECKPOINT} WHERE id = ?1"),
            params![id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn window(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        self.query(
            &format!(
                "{SELECT_CHECKPOINT}
                 WHERE session_id = ?1
                   AND timestamp >= (
                       SELECT MIN(timestamp) FROM checkpoints
                       WHERE session_id = ?1 AND message_id = ?2
                   )
                 ORDER BY timestamp DESC, rowid DESC"
            ),
            params![coords.session.as_str(), coords.message.as_str()],
        )
    }

    fn has_window(&self, coords: &Coordinates) -> Result<bool, StoreError> {
        // The anchor row is itself part of the window.
        let exists = self.db.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM checkpoints WHERE session_id = ?1 AND message_id = ?2
             )",
            params![coords.session.as_str(), coords.message.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn for_message(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        self.query(
            &format!(
                "{SELECT_CHECKPOINT}
                 WHERE session_id = ?1 AND message_id = ?2
                 ORDER BY timestamp ASC, rowid ASC"
            ),
            params![coords.session.as_str(), coords.message.as_str()],
        )
    }

    fn list_pending(&self, coords: &Coordinates) -> Result<Vec<Checkpoint>, StoreError> {
        self.query(
            &format!(
                "{SELECT_CHECKPOINT}
                 WHERE session_id = ?1 AND message_id = ?2 AND new_content IS NULL
                 ORDER BY timestamp ASC, rowid ASC"
            ),
            params![coords.session.as_str(), coords.message.as_str()],
        )
    }

    fn write_backup(&self, checkpoint: &Checkpoint, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let dir = self.layout.backup_dir();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Blob {
            path: dir.clone(),
            source,
        })?;
        let millis = self.clock.now().as_millis();
        let mut seq = 0;
        let mut path = self
            .layout
            .backup_path(&checkpoint.file_path, checkpoint.id, millis, seq);
        while path.exists() {
            seq += 1;
            path = self
                .layout
                .backup_path(&checkpoint.file_path, checkpoint.id, millis, seq);
        }
        self.write_blob(&path, bytes)?;
        Ok(path)
    }
}

fn path_str(path: &Path) -> Result<&str, StoreError> {
    path.to_str().ok_or_else(|| StoreError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}

/// A row as stored, before validation.
struct RawCheckpoint {
    id: String,
    session_id: String,
    message_id: String,
    file_path: String,
    timestamp: i64,
    patch_path: String,
    full_snapshot: bool,
    old_content: String,
    new_content: Option<String>,
    tool_type: String,
}

impl RawCheckpoint {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            message_id: row.get(2)?,
            file_path: row.get(3)?,
            timestamp: row.get(4)?,
            patch_path: row.get(5)?,
            full_snapshot: row.get(6)?,
            old_content: row.get(7)?,
            new_content: row.get(8)?,
            tool_type: row.get(9)?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };
        let id = CheckpointId::parse(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let session_id =
            SessionId::new(self.session_id.clone()).map_err(|e| corrupt(e.to_string()))?;
        let message_id =
            MessageId::new(self.message_id.clone()).map_err(|e| corrupt(e.to_string()))?;
        let tool_type = self
            .tool_type
            .parse::<ToolType>()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Checkpoint {
            id,
            session_id,
            message_id,
            file_path: PathBuf::from(self.file_path),
            timestamp: Timestamp::from_millis(self.timestamp),
            patch_path: PathBuf::from(self.patch_path),
            full_snapshot: self.full_snapshot,
            old_content: self.old_content,
            new_content: CheckpointContent::from_column(self.new_content),
            tool_type,
        })
    }
}
