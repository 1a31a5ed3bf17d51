//! End-to-end behavior of recording, resolving, reverting and unreverting.

use rollback_engine::ResolveOutcome;

use crate::common::{Project, at, edit_call, multi_edit_call, write_call};

#[test]
fn has_file_changes_tracks_window() {
    let mut p = Project::new();
    let m = at("s", "m1");
    assert!(!p.engine.has_file_changes(&m).unwrap());

    let call = write_call(&p.path("a.txt"), "x");
    p.engine.record_tool_call(&m, &call).unwrap();

    assert!(p.engine.has_file_changes(&m).unwrap());
    assert!(!p.engine.has_file_changes(&at("s", "m2")).unwrap());
    assert!(!p.engine.has_file_changes(&at("other", "m1")).unwrap());
}

#[test]
fn write_then_revert_restores_previous_content() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "hello");

    let call = write_call(&p.path("a.txt"), "world");
    let id = p.engine.record_tool_call(&m, &call).unwrap().unwrap();
    p.write("a.txt", "world");

    let listed = p.engine.list_checkpoints(&m).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].old_content, "hello");
    assert_eq!(listed[0].new_content.resolved(), Some("world"));

    let report = p.engine.revert(&m).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded, vec![p.path("a.txt")]);
    assert_eq!(p.read("a.txt").as_deref(), Some("hello"));
}

#[test]
fn created_file_is_deleted_by_revert() {
    let mut p = Project::new();
    let m = at("s", "m1");

    let call = write_call(&p.path("new.txt"), "new file");
    p.engine.record_tool_call(&m, &call).unwrap();
    p.write("new.txt", "new file");

    let listed = p.engine.list_checkpoints(&m).unwrap();
    assert_eq!(listed[0].old_content, "");
    assert!(listed[0].full_snapshot);

    let report = p.engine.revert(&m).unwrap();
    assert!(report.is_complete());
    assert_eq!(p.read("new.txt"), None);
}

#[test]
fn edit_round_trip_through_pending() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("lib.rs", "fn old() {}\n");

    let call = edit_call(&p.path("lib.rs"), "old", "new");
    let id = p.engine.record_tool_call(&m, &call).unwrap().unwrap();
    assert!(p.engine.list_checkpoints(&m).unwrap()[0].is_pending());

    // The tool runs, then the result is observed.
    p.write("lib.rs", "fn new() {}\n");
    let outcome = p.engine.resolve_pending(id, &p.path("lib.rs")).unwrap();
    assert!(matches!(outcome, ResolveOutcome::Resolved(_)));

    p.engine.revert(&m).unwrap();
    assert_eq!(p.read("lib.rs").as_deref(), Some("fn old() {}\n"));

    p.engine.unrevert(&m).unwrap();
    assert_eq!(p.read("lib.rs").as_deref(), Some("fn new() {}\n"));
}

#[test]
fn multi_edit_collapses_into_one_checkpoint() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "one two\n");

    let call = multi_edit_call(&p.path("a.txt"), &[("one", "1"), ("two", "2")]);
    p.engine.record_tool_call(&m, &call).unwrap().unwrap();
    p.write("a.txt", "1 2\n");

    let outcomes = p.engine.resolve_pending_for_message(&m).unwrap();
    assert_eq!(outcomes.len(), 1);

    let listed = p.engine.list_checkpoints(&m).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].old_content, "one two\n");
    assert_eq!(listed[0].new_content.resolved(), Some("1 2\n"));
}

#[test]
fn revert_is_idempotent() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "before");
    p.write("b.txt", "keep");

    p.engine
        .record_tool_call(&m, &write_call(&p.path("a.txt"), "after"))
        .unwrap();
    p.engine
        .record_tool_call(&m, &write_call(&p.path("c.txt"), "created"))
        .unwrap();
    p.write("a.txt", "after");
    p.write("c.txt", "created");

    p.engine.revert(&m).unwrap();
    let first = (p.read("a.txt"), p.read("b.txt"), p.read("c.txt"));
    let report = p.engine.revert(&m).unwrap();
    let second = (p.read("a.txt"), p.read("b.txt"), p.read("c.txt"));

    assert!(report.is_complete());
    assert_eq!(first, second);
    assert_eq!(second, (Some("before".into()), Some("keep".into()), None));
}

#[test]
fn orphaned_checkpoint_disappears_from_listing() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "x");

    let call = edit_call(&p.path("a.txt"), "x", "y");
    let id = p.engine.record_tool_call(&m, &call).unwrap().unwrap();
    std::fs::remove_file(p.path("a.txt")).unwrap();

    let outcome = p.engine.resolve_pending(id, &p.path("a.txt")).unwrap();
    assert!(matches!(outcome, ResolveOutcome::Orphaned { .. }));
    assert!(
        p.engine
            .list_checkpoints(&m)
            .unwrap()
            .iter()
            .all(|c| c.id != id)
    );
    assert!(!p.engine.has_file_changes(&m).unwrap());
}

#[test]
fn partial_failure_reports_each_file() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "a-old");

    p.engine
        .record_tool_call(&m, &write_call(&p.path("a.txt"), "a-new"))
        .unwrap();
    p.write("a.txt", "a-new");
    p.tick(101);
    p.engine
        .record_tool_call(&m, &write_call(&p.path("b.txt"), "b-new"))
        .unwrap();
    // b.txt became a directory: it cannot be rewritten or removed.
    std::fs::create_dir(p.path("b.txt")).unwrap();

    let report = p.engine.revert(&m).unwrap();
    assert!(report.is_partial());
    assert_eq!(report.succeeded, vec![p.path("a.txt")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, p.path("b.txt"));
    assert!(!report.failed[0].error.is_empty());
    assert_eq!(p.read("a.txt").as_deref(), Some("a-old"));
}

#[test]
fn same_file_in_window_reverts_to_latest_pre_state() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("x.txt", "1");

    p.tick(100);
    p.engine
        .record_tool_call(&m, &write_call(&p.path("x.txt"), "2"))
        .unwrap();
    p.write("x.txt", "2");
    p.tick(200);
    p.engine
        .record_tool_call(&m, &write_call(&p.path("x.txt"), "3"))
        .unwrap();
    p.write("x.txt", "3");

    p.engine.revert(&m).unwrap();
    assert_eq!(p.read("x.txt").as_deref(), Some("2"));
}

#[test]
fn revert_at_earlier_message_covers_later_messages() {
    let mut p = Project::new();
    let m1 = at("s", "m1");
    let m2 = at("s", "m2");
    p.write("a.txt", "a0");
    p.write("b.txt", "b0");

    p.engine
        .record_tool_call(&m1, &write_call(&p.path("a.txt"), "a1"))
        .unwrap();
    p.write("a.txt", "a1");
    p.tick(200);
    p.engine
        .record_tool_call(&m2, &write_call(&p.path("b.txt"), "b1"))
        .unwrap();
    p.write("b.txt", "b1");

    // Reverting the later message leaves the earlier one alone.
    p.engine.revert(&m2).unwrap();
    assert_eq!(p.read("a.txt").as_deref(), Some("a1"));
    assert_eq!(p.read("b.txt").as_deref(), Some("b0"));

    p.engine.revert(&m1).unwrap();
    assert_eq!(p.read("a.txt").as_deref(), Some("a0"));
    assert_eq!(p.read("b.txt").as_deref(), Some("b0"));

    let report = p.engine.unrevert(&m1).unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(p.read("a.txt").as_deref(), Some("a1"));
    assert_eq!(p.read("b.txt").as_deref(), Some("b1"));
}

#[test]
fn window_listing_includes_later_messages() {
    let mut p = Project::new();
    let m1 = at("s", "m1");
    let m2 = at("s", "m2");

    let first = p
        .engine
        .record_tool_call(&m1, &write_call(&p.path("a.txt"), "a1"))
        .unwrap()
        .unwrap();
    p.tick(200);
    let second = p
        .engine
        .record_tool_call(&m2, &write_call(&p.path("b.txt"), "b1"))
        .unwrap()
        .unwrap();

    let window: Vec<_> = p
        .engine
        .window_checkpoints(&m1)
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(window, vec![second, first]);

    let window = p.engine.window_checkpoints(&m2).unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].id, second);
    assert_eq!(p.engine.list_checkpoints(&m1).unwrap().len(), 1);
}

#[test]
fn unrevert_leaves_pending_files_untouched() {
    let mut p = Project::new();
    let m = at("s", "m1");
    p.write("a.txt", "original");

    p.engine
        .record_tool_call(&m, &edit_call(&p.path("a.txt"), "original", "edited"))
        .unwrap();
    p.write("a.txt", "edited by hand");

    let report = p.engine.unrevert(&m).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded, vec![p.path("a.txt")]);
    assert_eq!(p.read("a.txt").as_deref(), Some("edited by hand"));
}

#[test]
fn revert_of_unknown_message_is_empty() {
    let p = Project::new();
    let report = p.engine.revert(&at("s", "nothing")).unwrap();
    assert!(report.is_empty());
    assert!(report.is_complete());
}
