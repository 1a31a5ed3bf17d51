use std::path::{Path, PathBuf};

use rollback_types::CheckpointId;

/// On-disk layout of a project's checkpoint store.
///
/// ```text
/// <project>/.rollback/
///   checkpoints.db
///   blobs/<checkpoint-id>.patch
///   blobs/backups/<file-name>.<checkpoint-id>.<unix-ms>[-<seq>].bak
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub const DEFAULT_DIR_NAME: &'static str = ".rollback";
    const DB_FILE: &'static str = "checkpoints.db";
    const BLOB_DIR: &'static str = "blobs";
    const BACKUP_DIR: &'static str = "backups";

    /// A relative `root` is made absolute against the current directory; stored
    /// patch paths must not depend on where the store is reopened from.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
        }
    }

    pub fn for_project(project_root: &Path, dir_name: &str) -> Self {
        Self::new(project_root.join(dir_name))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join(Self::DB_FILE)
    }

    #[must_use]
    pub fn blob_dir(&self) -> PathBuf {
        self.root.join(Self::BLOB_DIR)
    }

    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.blob_dir().join(Self::BACKUP_DIR)
    }

    #[must_use]
    pub fn patch_path(&self, id: CheckpointId) -> PathBuf {
        self.blob_dir().join(format!("{id}.patch"))
    }

    /// `seq` tells apart backups of one checkpoint taken in the same millisecond;
    /// the first one carries no suffix.
    #[must_use]
    pub fn backup_path(
        &self,
        file_path: &Path,
        id: CheckpointId,
        millis: i64,
        seq: u32,
    ) -> PathBuf {
        let name = file_path
            .file_name()
            .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
        let file_name = if seq == 0 {
            format!("{name}.{id}.{millis}.bak")
        } else {
            format!("{name}.{id}.{millis}-{seq}.bak")
        };
        self.backup_dir().join(file_name)
    }
}
