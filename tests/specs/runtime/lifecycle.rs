//! Task lifecycle: terminating events and their output chunks.

use crate::prelude::*;
use engram_core::{ChunkKind, Retention};
use engram_engine::ExecutionMode;

#[tokio::test]
async fn task_completed_terminates_with_critical_output() {
    let rt = runtime();
    let thread = rt.thread().await;

    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, task_completed_event("done", 1))
        .await
        .unwrap();

    assert!(outcome.should_terminate);
    assert!(!outcome.should_interrupt);

    let output: Vec<_> = outcome
        .state
        .top_level_chunks()
        .filter(|c| c.kind == ChunkKind::Output)
        .collect();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].retention, Retention::Critical);
    assert_eq!(output[0].content.as_text(), Some("done"));
}

#[tokio::test]
async fn drain_exits_on_terminate_with_events_remaining() {
    let rt = runtime();
    let thread = rt.thread().await;

    // Preload: a terminating event followed by more work.
    rt.debug.set_execution_mode(&thread.id, ExecutionMode::Stepping);
    rt.orchestrator
        .dispatch(&thread.id, task_completed_event("done", 1))
        .await
        .unwrap();
    rt.orchestrator
        .dispatch(&thread.id, user_message_event("after the end", 2))
        .await
        .unwrap();
    rt.debug.set_execution_mode(&thread.id, ExecutionMode::Auto);

    let outcome = rt.orchestrator.drain_pending(&thread.id).await.unwrap();

    assert!(outcome.should_terminate);
    // The drain loop exited even though an event remains queued.
    assert_eq!(rt.debug.queued_event_count(&thread.id).await.unwrap(), 1);
}

#[tokio::test]
async fn abandoned_and_terminated_also_terminate() {
    let rt = runtime();

    let thread = rt.thread().await;
    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, task_abandoned_event("blocked on input", 1))
        .await
        .unwrap();
    assert!(outcome.should_terminate);
    assert_eq!(
        outcome
            .state
            .top_level_chunks()
            .find(|c| c.kind == ChunkKind::Output)
            .unwrap()
            .content
            .as_text(),
        Some("blocked on input")
    );
}
