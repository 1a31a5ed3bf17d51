//! Shared test utilities and fixtures
//!
//! A `Project` is a temp directory with a checkpoint engine on a manual clock.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rollback_engine::CheckpointEngine;
use rollback_store::{ManualClock, SqliteCheckpointStore, StoreLayout, StoreOptions};
use rollback_types::{Coordinates, ToolInvocation};
use serde_json::json;
use tempfile::TempDir;

pub struct Project {
    pub dir: TempDir,
    pub clock: ManualClock,
    pub engine: CheckpointEngine,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::at(100);
        let engine = open_engine(dir.path(), &clock);
        Self { dir, clock, engine }
    }

    /// Drop the engine and open the store again from disk.
    pub fn reopen(&mut self) {
        self.engine = open_engine(self.dir.path(), &self.clock);
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::for_project(self.root(), StoreLayout::DEFAULT_DIR_NAME)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    /// File content, or `None` if it does not exist.
    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.path(name)).ok()
    }

    pub fn tick(&self, millis: i64) {
        self.clock.set(millis);
    }
}

fn open_engine(root: &Path, clock: &ManualClock) -> CheckpointEngine {
    let store = SqliteCheckpointStore::open_with_options(
        StoreLayout::for_project(root, StoreLayout::DEFAULT_DIR_NAME),
        StoreOptions { sync_writes: false },
    )
    .expect("open store")
    .with_clock(clock.clone());
    CheckpointEngine::with_store(root, Box::new(store))
}

pub fn at(session: &str, message: &str) -> Coordinates {
    Coordinates::new(session, message).expect("coordinates")
}

pub fn write_call(path: &Path, content: &str) -> ToolInvocation {
    ToolInvocation::new(
        "Write",
        json!({ "file_path": path.to_str().expect("utf-8 path"), "content": content }),
    )
}

pub fn edit_call(path: &Path, old: &str, new: &str) -> ToolInvocation {
    ToolInvocation::new(
        "Edit",
        json!({
            "file_path": path.to_str().expect("utf-8 path"),
            "old_string": old,
            "new_string": new,
        }),
    )
}

pub fn multi_edit_call(path: &Path, edits: &[(&str, &str)]) -> ToolInvocation {
    let edits: Vec<_> = edits
        .iter()
        .map(|(old, new)| json!({ "old_string": old, "new_string": new }))
        .collect();
    ToolInvocation::new(
        "MultiEdit",
        json!({ "file_path": path.to_str().expect("utf-8 path"), "edits": edits }),
    )
}
