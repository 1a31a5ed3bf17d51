//! The async handle used by hosts running on tokio.

use rollback_engine::{CheckpointEngine, EngineHandle, ResolveOutcome, RollbackConfig};
use rollback_types::ToolInvocation;
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_records_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let handle = EngineHandle::new(CheckpointEngine::open(dir.path(), &RollbackConfig::default()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let call = ToolInvocation::new(
                "Write",
                json!({ "file_path": format!("f{i}.txt"), "content": format!("{i}") }),
            );
            handle.record_tool_call("s", "m", call).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_some());
    }

    let listed = handle.list_checkpoints("s", "m").await.unwrap();
    assert_eq!(listed.len(), 8);
    assert!(
        listed
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    );
}

#[tokio::test]
async fn pending_turn_resolves_through_handle() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, "one").unwrap();
    let handle = EngineHandle::new(CheckpointEngine::open(dir.path(), &RollbackConfig::default()));

    let call = ToolInvocation::new(
        "Edit",
        json!({ "file_path": "a.txt", "old_string": "one", "new_string": "two" }),
    );
    handle.record_tool_call("s", "m", call).await.unwrap();
    assert_eq!(handle.list_pending("s", "m").await.unwrap().len(), 1);

    std::fs::write(&file, "two").unwrap();
    let outcomes = handle.resolve_pending_for_message("s", "m").await.unwrap();
    assert!(matches!(outcomes.as_slice(), [ResolveOutcome::Resolved(_)]));
    assert!(handle.list_pending("s", "m").await.unwrap().is_empty());

    let report = handle.unrevert("s", "m").await.unwrap();
    assert!(report.is_complete());
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "two");
}
