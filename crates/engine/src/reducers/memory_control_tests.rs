// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::Reducer;
use engram_core::test_support::{
    forget_event, mark_critical_event, state_with_chunks, text_chunk, user_message_event,
};
use engram_core::{ChunkId, ChunkKind, OperationKind, ThreadId};

#[test]
fn mark_critical_derives_pinned_chunk() {
    let chunk = text_chunk(ChunkKind::Environment, "keep me");
    let state = state_with_chunks(ThreadId::new(), vec![chunk.clone()]);

    let output = MemoryControlReducer
        .reduce(&state, &mark_critical_event(&chunk.id, 5))
        .unwrap();

    let pinned = &output.chunks[0];
    assert_eq!(pinned.retention, Retention::Critical);
    assert_eq!(pinned.parent_ids, vec![chunk.id.clone()]);
    assert_eq!(pinned.content.as_text(), Some("keep me"));

    match &output.operations[0].kind {
        OperationKind::Update { old_id, new_id } => {
            assert_eq!(old_id, &chunk.id);
            assert_eq!(new_id, &pinned.id);
        }
        other => panic!("unexpected operation: {other:?}"),
    }
}

#[test]
fn mark_critical_on_critical_chunk_is_noop() {
    let chunk = text_chunk(ChunkKind::System, "already critical");
    let state = state_with_chunks(ThreadId::new(), vec![chunk.clone()]);

    let output = MemoryControlReducer
        .reduce(&state, &mark_critical_event(&chunk.id, 5))
        .unwrap();
    assert!(output.is_empty());
}

#[test]
fn mark_critical_missing_chunk_is_reducer_error() {
    let state = state_with_chunks(ThreadId::new(), vec![]);
    let missing = ChunkId::from_string("chunk_missing");

    let err = MemoryControlReducer
        .reduce(&state, &mark_critical_event(&missing, 5))
        .unwrap_err();
    assert_eq!(err.reducer, "memory_control");
    assert!(err.message.contains("chunk_missing"));
}

#[test]
fn forget_emits_bare_delete() {
    let chunk = text_chunk(ChunkKind::Environment, "drop me");
    let state = state_with_chunks(ThreadId::new(), vec![chunk.clone()]);

    let output = MemoryControlReducer
        .reduce(&state, &forget_event(&chunk.id, 5))
        .unwrap();
    assert!(output.chunks.is_empty());
    assert!(matches!(
        &output.operations[0].kind,
        OperationKind::Delete { chunk_id } if chunk_id == &chunk.id
    ));
}

#[test]
fn rejects_conversation_events() {
    assert!(!MemoryControlReducer.accepts(&user_message_event("hi", 1)));
}
