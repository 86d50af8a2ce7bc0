//! Snapshot capture, restore, and archive files.

use crate::prelude::*;
use engram_storage::{ArchivedSnapshot, Storage as _};

#[tokio::test]
async fn snapshot_restore_preserves_current_chunk_ids() {
    let rt = runtime();
    let thread = rt.thread().await;
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("one", 1))
        .await
        .unwrap();
    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, user_message_event("two", 2))
        .await
        .unwrap();

    let snapshot = rt.debug.create_snapshot(&thread.id, None).await.unwrap();
    let restored = rt.debug.restore_snapshot(&snapshot).await.unwrap();

    let restored_state = rt
        .storage
        .get_state(&restored.current_state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored_state.chunk_ids, outcome.state.chunk_ids);

    // The restored thread keeps working: children survive the round trip.
    let container = restored_state.working_history().unwrap();
    let texts: Vec<_> = restored_state
        .children_of(container)
        .iter()
        .map(|c| c.content.as_text().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["one", "two"]);
}

#[tokio::test]
async fn restore_replaces_existing_thread_history() {
    let rt = runtime();
    let thread = rt.thread().await;
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("kept", 1))
        .await
        .unwrap();

    let snapshot = rt.debug.create_snapshot(&thread.id, None).await.unwrap();

    // Diverge after the snapshot, then restore.
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("discarded", 2))
        .await
        .unwrap();
    rt.debug.restore_snapshot(&snapshot).await.unwrap();

    let states = rt.storage.get_states_by_thread(&thread.id).await.unwrap();
    assert_eq!(states.len(), 1);
    let texts: Vec<_> = states[0]
        .children_of(states[0].working_history().unwrap())
        .iter()
        .map(|c| c.content.as_text().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["kept"]);
}

#[tokio::test]
async fn snapshot_survives_the_archive_file_format() {
    let rt = runtime();
    let thread = rt.thread().await;
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("persist me", 1))
        .await
        .unwrap();

    let snapshot = rt
        .debug
        .create_snapshot(&thread.id, Some("pre-release".to_string()))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.snapshot.json");
    ArchivedSnapshot::new(snapshot.clone()).save(&path).unwrap();

    let loaded = ArchivedSnapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.snapshot, snapshot);

    // A restore from the loaded archive behaves like a live snapshot.
    let restored = rt.debug.restore_snapshot(&loaded.snapshot).await.unwrap();
    let state = rt
        .storage
        .get_state(&restored.current_state_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        state.chunk_ids,
        snapshot.last_state().unwrap().chunk_ids
    );
}
