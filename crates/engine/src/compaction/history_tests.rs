// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::compaction::CompactionContext;
use engram_adapters::FakeModelClient;
use engram_core::test_support::{state_with_chunks, text_chunk};
use engram_core::{ChunkKind, ThreadId};
use std::sync::Arc;

fn compactor() -> (HistoryCompactor, FakeModelClient) {
    let model = FakeModelClient::new("condensed history");
    (HistoryCompactor::new(Arc::new(model.clone())), model)
}

#[test]
fn accepts_compressible_history_kinds() {
    let (compactor, _) = compactor();
    let history = text_chunk(ChunkKind::WorkingHistory, "");
    let compacted = text_chunk(ChunkKind::Compacted, "old summary");
    assert!(compactor.can_compact(&[history, compacted]));
}

#[test]
fn rejects_empty_window() {
    let (compactor, _) = compactor();
    assert!(!compactor.can_compact(&[]));
}

#[test]
fn rejects_critical_and_foreign_kinds() {
    let (compactor, _) = compactor();
    let critical = Chunk::builder(ChunkKind::WorkingHistory, ChunkContent::text(""))
        .retention(Retention::Critical)
        .build();
    assert!(!compactor.can_compact(&[critical]));

    let output = text_chunk(ChunkKind::Output, "result");
    assert!(!compactor.can_compact(&[output]));
}

#[tokio::test]
async fn compact_wraps_reply_with_lineage() {
    let (compactor, model) = compactor();

    let leaf = Chunk::builder(ChunkKind::UserMessage, ChunkContent::text("hello there"))
        .as_child()
        .build();
    let container = Chunk::builder(ChunkKind::WorkingHistory, ChunkContent::text(""))
        .children(vec![leaf.id.clone()])
        .build();
    let mut state = state_with_chunks(ThreadId::new(), vec![container.clone()]);
    state.chunks.insert(leaf.id.clone(), leaf);

    let window = vec![container.clone()];
    let ctx = CompactionContext {
        state: &state,
        window: &window,
        task_goal: Some("answer questions".to_string()),
        progress: None,
        now_ms: 5_000,
    };

    let summary = compactor.compact(&ctx).await.unwrap();
    assert_eq!(summary.kind, ChunkKind::Compacted);
    assert_eq!(summary.retention, Retention::Compressible);
    assert_eq!(summary.parent_ids, vec![container.id]);
    assert_eq!(summary.content.as_text(), Some("condensed history"));
    assert_eq!(summary.metadata.created_at_ms, 5_000);

    let prompt = &model.calls()[0].request.messages[0].content;
    assert!(prompt.contains("task goal: answer questions"));
    assert!(prompt.contains("- [user_message] hello there"));
}

#[tokio::test]
async fn empty_model_reply_is_an_error() {
    let model = FakeModelClient::new("   ");
    let compactor = HistoryCompactor::new(Arc::new(model));

    let container = text_chunk(ChunkKind::WorkingHistory, "");
    let state = state_with_chunks(ThreadId::new(), vec![container.clone()]);
    let window = vec![container];
    let ctx = CompactionContext {
        state: &state,
        window: &window,
        task_goal: None,
        progress: None,
        now_ms: 1,
    };

    let err = compactor.compact(&ctx).await.unwrap_err();
    assert!(matches!(err, CompactorError::Model(_)));
}

#[tokio::test]
async fn max_summary_tokens_is_forwarded() {
    let model = FakeModelClient::new("short");
    let compactor =
        HistoryCompactor::new(Arc::new(model.clone())).with_max_summary_tokens(128);

    let container = text_chunk(ChunkKind::WorkingHistory, "");
    let state = state_with_chunks(ThreadId::new(), vec![container.clone()]);
    let window = vec![container];
    let ctx = CompactionContext {
        state: &state,
        window: &window,
        task_goal: None,
        progress: None,
        now_ms: 1,
    };

    compactor.compact(&ctx).await.unwrap();
    assert_eq!(model.calls()[0].request.max_tokens, Some(128));
}
