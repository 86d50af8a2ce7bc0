//! Stepping mode: queueing without processing, one step at a time.

use crate::prelude::*;
use engram_core::StepStatus;
use engram_engine::{EngineError, ExecutionMode};
use engram_storage::Storage as _;

#[tokio::test]
async fn stepping_queues_three_then_steps_them_down() {
    let rt = runtime();
    let thread = rt.thread().await;
    rt.debug.set_execution_mode(&thread.id, ExecutionMode::Stepping);

    for i in 0..3u64 {
        rt.orchestrator
            .dispatch(&thread.id, user_message_event(&format!("m{i}"), i))
            .await
            .unwrap();
    }

    // Queue length 3 and no new states.
    assert_eq!(rt.debug.queued_event_count(&thread.id).await.unwrap(), 3);
    let states = rt.storage.get_states_by_thread(&thread.id).await.unwrap();
    assert_eq!(states.len(), 1);

    // Three steps: remaining 2, then 1, then 0, each step completed.
    for remaining in [2usize, 1, 0] {
        rt.debug.step(&thread.id).await.unwrap();
        assert_eq!(
            rt.debug.queued_event_count(&thread.id).await.unwrap(),
            remaining
        );
        let steps = rt.storage.get_steps_by_thread(&thread.id).await.unwrap();
        assert_eq!(steps.last().unwrap().status, StepStatus::Completed);
    }

    // All three leaves arrived in order.
    let state = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    let container = state.working_history().unwrap();
    let texts: Vec<_> = state
        .children_of(container)
        .iter()
        .map(|c| c.content.as_text().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["m0", "m1", "m2"]);
}

#[tokio::test]
async fn step_in_auto_mode_is_rejected() {
    let rt = runtime();
    let thread = rt.thread().await;

    let err = rt.debug.step(&thread.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Mode(_)));
}

#[tokio::test]
async fn switching_back_to_auto_drains_queue() {
    let rt = runtime();
    let thread = rt.thread().await;
    rt.debug.set_execution_mode(&thread.id, ExecutionMode::Stepping);

    rt.orchestrator
        .dispatch(&thread.id, user_message_event("queued", 1))
        .await
        .unwrap();
    rt.debug.set_execution_mode(&thread.id, ExecutionMode::Auto);

    let outcome = rt.orchestrator.drain_pending(&thread.id).await.unwrap();
    assert_eq!(rt.debug.queued_event_count(&thread.id).await.unwrap(), 0);
    assert!(outcome.state.working_history().is_some());
}
