//! Crash recovery, ordering and degraded-mode behavior.

use std::fs;

use rollback_engine::{CheckpointEngine, EngineError, ResolveError, RollbackConfig};
use rollback_store::{StoreError, StoreLayout};
use rollback_types::ToolInvocation;
use rollback_utils::TEMP_PREFIX;
use serde_json::json;

use crate::common::{Project, at, edit_call, write_call};

#[test]
fn reopen_drops_rows_whose_blob_is_missing() {
    let mut p = Project::new();
    let m = at("s", "m1");

    let kept = p
        .engine
        .record_tool_call(&m, &write_call(&p.path("a.txt"), "a"))
        .unwrap()
        .unwrap();
    let lost = p
        .engine
        .record_tool_call(&m, &write_call(&p.path("b.txt"), "b"))
        .unwrap()
        .unwrap();

    // Simulate a crash that lost one blob and left a half-written temp file.
    let layout = p.layout();
    fs::remove_file(layout.patch_path(lost)).unwrap();
    fs::write(layout.blob_dir().join(format!("{TEMP_PREFIX}abc")), b"partial").unwrap();

    p.reopen();
    let ids: Vec<_> = p
        .engine
        .list_checkpoints(&m)
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![kept]);
    assert!(
        !layout
            .blob_dir()
            .join(format!("{TEMP_PREFIX}abc"))
            .exists()
    );
}

#[test]
fn every_listed_checkpoint_has_a_blob() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "x\n");

    p.engine
        .record_tool_call(&m, &write_call(&p.path("a.txt"), "y\n"))
        .unwrap();
    p.engine
        .record_tool_call(&m, &edit_call(&p.path("a.txt"), "y", "z"))
        .unwrap();

    for checkpoint in p.engine.list_checkpoints(&m).unwrap() {
        let patch = fs::read_to_string(&checkpoint.patch_path).unwrap();
        assert!(patch.starts_with("--- "));
    }
}

#[test]
fn timestamps_are_strictly_increasing() {
    let mut p = Project::new();
    let m = at("s", "m1");

    // The clock never moves.
    for name in ["a", "b", "c", "d"] {
        p.engine
            .record_tool_call(&m, &write_call(&p.path(name), name))
            .unwrap();
    }

    let stamps: Vec<i64> = p
        .engine
        .list_checkpoints(&m)
        .unwrap()
        .iter()
        .map(|c| c.timestamp.as_millis())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{stamps:?}");
}

#[test]
fn second_resolution_is_rejected() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "x");

    let id = p
        .engine
        .record_tool_call(&m, &edit_call(&p.path("a.txt"), "x", "y"))
        .unwrap()
        .unwrap();
    p.write("a.txt", "y");
    p.engine.resolve_pending(id, &p.path("a.txt")).unwrap();

    p.write("a.txt", "z");
    let err = p.engine.resolve_pending(id, &p.path("a.txt")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Resolve(ResolveError::AlreadyResolved { .. })
    ));
    assert_eq!(
        p.engine.list_checkpoints(&m).unwrap()[0]
            .new_content
            .resolved(),
        Some("y")
    );
}

#[test]
fn non_file_tools_and_empty_multi_edits_record_nothing() {
    let mut p = Project::new();
    let m = at("s", "m1");

    let calls = [
        ToolInvocation::new("Read", json!({ "file_path": "a.txt" })),
        ToolInvocation::new("Bash", json!({ "command": "ls" })),
        ToolInvocation::new("MultiEdit", json!({ "file_path": "a.txt", "edits": [] })),
    ];
    for call in &calls {
        assert_eq!(p.engine.record_tool_call(&m, call).unwrap(), None);
    }
    assert!(!p.engine.has_file_changes(&m).unwrap());
}

#[test]
fn disabled_store_records_nothing_and_refuses_revert() {
    let dir = tempfile::tempdir().unwrap();
    let config = RollbackConfig::parse("[store]\nenabled = false\n").unwrap();
    let mut engine = CheckpointEngine::open(dir.path(), &config);
    let m = at("s", "m1");

    let call = write_call(&dir.path().join("a.txt"), "x");
    assert_eq!(engine.record_tool_call(&m, &call).unwrap(), None);

    for result in [engine.revert(&m), engine.unrevert(&m)] {
        assert!(matches!(
            result,
            Err(EngineError::Store(StoreError::Unavailable { .. }))
        ));
    }
    assert!(matches!(
        engine.has_file_changes(&m),
        Err(EngineError::Store(StoreError::Unavailable { .. }))
    ));
}

#[test]
fn configured_directory_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let config = RollbackConfig::parse("[store]\ndir = \".history\"\n").unwrap();
    let mut engine = CheckpointEngine::open(dir.path(), &config);
    let m = at("s", "m1");

    engine
        .record_tool_call(&m, &write_call(&dir.path().join("a.txt"), "x"))
        .unwrap()
        .unwrap();

    let layout = StoreLayout::for_project(dir.path(), ".history");
    assert!(layout.db_path().exists());
    assert!(!dir.path().join(StoreLayout::DEFAULT_DIR_NAME).exists());
}

#[test]
fn revert_backs_up_current_content() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "before");

    p.engine
        .record_tool_call(&m, &write_call(&p.path("a.txt"), "after"))
        .unwrap();
    p.write("a.txt", "after, then hand-edited");
    p.engine.revert(&m).unwrap();

    let backups: Vec<_> = fs::read_dir(p.layout().backup_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        fs::read_to_string(&backups[0]).unwrap(),
        "after, then hand-edited"
    );
}
