//! Token-budget pressure: pending marks, compaction, truncation.

use crate::prelude::*;
use engram_core::{ChunkKind, Retention};
use engram_engine::{ExecutionMode, TokenThresholds};

fn tight() -> TokenThresholds {
    TokenThresholds {
        soft: 20,
        hard: 50,
        truncation: 100_000,
    }
}

#[tokio::test]
async fn stepping_records_pending_compaction_then_executes_it() {
    let rt = runtime_with(tight());
    let thread = rt.thread().await;
    rt.orchestrator
        .modes()
        .set_mode(&thread.id, ExecutionMode::Stepping);

    // Five ~100-char responses (25 tokens each under the len/4 tokenizer).
    for i in 0..5u64 {
        rt.orchestrator
            .dispatch(&thread.id, text_response_event(&"x".repeat(100), i))
            .await
            .unwrap();
    }
    assert!(!rt.debug.has_pending_compaction(&thread.id));

    // Step until the hard threshold is crossed.
    let mut steps_taken = 0;
    while !rt.debug.has_pending_compaction(&thread.id) {
        rt.debug.step(&thread.id).await.unwrap();
        steps_taken += 1;
        assert!(steps_taken <= 5, "pending compaction never recorded");
    }

    // The pending mark was recorded, not executed: history is still raw.
    let before = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    assert!(before.working_history().is_some());
    assert!(before
        .top_level_chunks()
        .all(|c| c.kind != ChunkKind::Compacted));

    // The next step executes the compaction, not an event.
    let queued_before = rt.debug.queued_event_count(&thread.id).await.unwrap();
    rt.debug.step(&thread.id).await.unwrap();
    assert_eq!(
        rt.debug.queued_event_count(&thread.id).await.unwrap(),
        queued_before
    );
    assert!(!rt.debug.has_pending_compaction(&thread.id));

    let after = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    let compacted: Vec<_> = after
        .top_level_chunks()
        .filter(|c| c.kind == ChunkKind::Compacted)
        .collect();
    assert_eq!(compacted.len(), 1);
    assert_eq!(compacted[0].retention, Retention::Compressible);

    // Lineage points at the replaced compactable chunks, which are gone.
    assert!(!compacted[0].parent_ids.is_empty());
    for parent in &compacted[0].parent_ids {
        assert!(!after.chunks.contains_key(parent));
    }
    assert_eq!(rt.model.call_count(), 1);
}

#[tokio::test]
async fn auto_mode_compacts_during_drain() {
    let rt = runtime_with(tight());
    let thread = rt.thread().await;

    for i in 0..5u64 {
        rt.orchestrator
            .dispatch(&thread.id, text_response_event(&"x".repeat(100), i))
            .await
            .unwrap();
    }

    let state = rt.orchestrator.snapshot_outcome(&thread.id).await.unwrap().state;
    assert!(state
        .top_level_chunks()
        .any(|c| c.kind == ChunkKind::Compacted));
    assert!(rt.model.call_count() >= 1);

    // The compaction prompt wrapped the history in the template sections.
    let prompt = &rt.model.calls()[0].request.messages[0].content;
    assert!(prompt.contains("<context>"));
    assert!(prompt.contains("<entries>"));
}

#[tokio::test]
async fn truncation_drops_oldest_history() {
    let rt = runtime_with(TokenThresholds {
        soft: 1,
        hard: 2,
        truncation: 10,
    });
    let thread = rt.thread().await;

    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, text_response_event(&"x".repeat(400), 1))
        .await
        .unwrap();

    // 100 tokens of history crossed the truncation threshold; the drain's
    // budget tick deleted it.
    assert!(outcome.state.working_history().is_none());
    assert!(outcome.state.chunks.is_empty());
}

#[tokio::test]
async fn critical_chunks_survive_pressure() {
    let rt = runtime_with(TokenThresholds {
        soft: 1,
        hard: 2,
        truncation: 10,
    });
    let thread = rt.thread().await;

    // A critical output lands first, then oversized history.
    rt.orchestrator
        .dispatch(
            &thread.id,
            task_completed_event(&"r".repeat(400), 1)
                .with_strategy(engram_core::DispatchStrategy::Queue),
        )
        .await
        .unwrap();
    let outcome = rt
        .orchestrator
        .dispatch(&thread.id, text_response_event(&"x".repeat(400), 2))
        .await
        .unwrap();

    // History is gone, the critical output chunk is not.
    assert!(outcome.state.working_history().is_none());
    let output: Vec<_> = outcome
        .state
        .top_level_chunks()
        .filter(|c| c.kind == ChunkKind::Output)
        .collect();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].retention, Retention::Critical);
}
