//! Conversation flow: user turns and tool round-trips.

use crate::prelude::*;
use engram_core::{ChunkKind, StepStatus};
use engram_storage::Storage as _;

#[tokio::test]
async fn user_turn_builds_working_history() {
    let rt = runtime();
    let thread = rt.thread().await;

    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, user_message_event("hi", 1_000))
        .await
        .unwrap();

    // One new state with exactly one leaf inside a working-history container.
    assert_eq!(outcome.state.chunk_ids.len(), 1);
    let container = outcome.state.working_history().unwrap();
    let children = outcome.state.children_of(container);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind, ChunkKind::UserMessage);
    assert_eq!(children[0].content.as_text(), Some("hi"));

    // Queue is empty and the step record completed.
    assert_eq!(
        rt.orchestrator.queued_event_count(&thread.id).await.unwrap(),
        0
    );
    let steps = rt.storage.get_steps_by_thread(&thread.id).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Completed);
}

#[tokio::test]
async fn tool_round_trip_appends_action_then_response() {
    let rt = runtime();
    let thread = rt.thread().await;

    rt.orchestrator
        .dispatch(&thread.id, user_message_event("hi", 1))
        .await
        .unwrap();
    let after_call = rt
        .orchestrator
        .dispatch(
            &thread.id,
            tool_call_event("read", "c1", serde_json::json!({"path": "/a"}), 2),
        )
        .await
        .unwrap();
    let after_result = rt
        .orchestrator
        .dispatch(
            &thread.id,
            tool_result_event("c1", true, serde_json::json!("ok"), 3),
        )
        .await
        .unwrap();

    // Two further states, each appending one child to the same container.
    let states = rt.storage.get_states_by_thread(&thread.id).await.unwrap();
    assert_eq!(states.len(), 4); // initial + three events

    let call_children = after_call
        .state
        .children_of(after_call.state.working_history().unwrap())
        .iter()
        .map(|c| c.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        call_children,
        vec![ChunkKind::UserMessage, ChunkKind::AgentAction]
    );

    let result_children = after_result
        .state
        .children_of(after_result.state.working_history().unwrap())
        .iter()
        .map(|c| c.kind)
        .collect::<Vec<_>>();
    assert_eq!(
        result_children,
        vec![
            ChunkKind::UserMessage,
            ChunkKind::AgentAction,
            ChunkKind::ActionResponse
        ]
    );
}

#[tokio::test]
async fn tool_result_payload_is_preserved() {
    let rt = runtime();
    let thread = rt.thread().await;

    rt.orchestrator
        .dispatch(
            &thread.id,
            tool_result_event("c9", false, serde_json::json!({"error": "denied"}), 1),
        )
        .await
        .unwrap();

    let state = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    let container = state.working_history().unwrap();
    let leaf = state.children_of(container)[0];
    let rendered = leaf.rendered();
    assert!(rendered.contains("c9"));
    assert!(rendered.contains("denied"));
}
