//! Forking and chunk edits.

use crate::prelude::*;
use engram_storage::Storage as _;

#[tokio::test]
async fn fork_then_edit_leaves_source_untouched() {
    let rt = runtime();
    let thread = rt.thread().await;

    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, user_message_event("original", 1))
        .await
        .unwrap();
    let source_state = outcome.state.clone();
    let container = source_state.working_history().unwrap();
    let leaf = source_state.children_of(container)[0].clone();

    // Fork, then edit the leaf inside the fork.
    let fork = rt
        .debug
        .fork_from_state(&thread.id, &source_state.id)
        .await
        .unwrap();
    let forked_state_id = fork.current_state_id.clone();
    let edited = rt
        .debug
        .edit_chunk(
            &fork.id,
            &forked_state_id,
            &leaf.id,
            engram_core::ChunkContent::text("new"),
        )
        .await
        .unwrap();

    // The fork's latest state holds the edited chunk with lineage.
    let new_container = edited.working_history().unwrap();
    let new_leaf = edited.children_of(new_container)[0];
    assert_eq!(new_leaf.content.as_text(), Some("new"));
    assert_eq!(new_leaf.parent_ids, vec![leaf.id.clone()]);

    // The source thread's state is unchanged: same id, same content.
    let source_again = rt
        .storage
        .get_state(&source_state.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source_again.id, source_state.id);
    assert_eq!(
        source_again.get_chunk(&leaf.id).unwrap().content.as_text(),
        Some("original")
    );
}

#[tokio::test]
async fn fork_isolation_is_two_way() {
    let rt = runtime();
    let thread = rt.thread().await;
    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, user_message_event("shared", 1))
        .await
        .unwrap();

    let fork = rt
        .debug
        .fork_from_state(&thread.id, &outcome.state.id)
        .await
        .unwrap();

    // Work on both threads after the fork.
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("only source", 2))
        .await
        .unwrap();
    rt.orchestrator
        .dispatch(&fork.id, user_message_event("only fork", 3))
        .await
        .unwrap();

    let source_state = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    let fork_state = rt.orchestrator.snapshot_outcome(&fork.id).await.unwrap().state;

    let texts = |state: &engram_core::State| {
        state
            .children_of(state.working_history().unwrap())
            .iter()
            .map(|c| c.content.as_text().unwrap().to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(texts(&source_state), vec!["shared", "only source"]);
    assert_eq!(texts(&fork_state), vec!["shared", "only fork"]);
}

#[tokio::test]
async fn fork_records_its_origin() {
    let rt = runtime();
    let thread = rt.thread().await;
    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, user_message_event("hi", 1))
        .await
        .unwrap();

    let fork = rt
        .debug
        .fork_from_state(&thread.id, &outcome.state.id)
        .await
        .unwrap();

    let origin = &fork.metadata.custom["forked_from"];
    assert_eq!(origin["thread_id"], serde_json::json!(thread.id));
    assert_eq!(origin["state_id"], serde_json::json!(outcome.state.id));
}
