// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::chunk::{Chunk, ChunkContent, ChunkKind};
use crate::event::{Event, EventPayload};
use crate::state::State;
use crate::thread::{Thread, ThreadId};

// ── Event factory functions ─────────────────────────────────────────────────

pub fn user_message_event(content: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::UserMessage {
            content: content.to_string(),
        },
        ts,
    )
}

pub fn text_response_event(content: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::LlmTextResponse {
            content: content.to_string(),
        },
        ts,
    )
}

pub fn thinking_event(content: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::Thinking {
            content: content.to_string(),
        },
        ts,
    )
}

pub fn tool_call_event(tool_name: &str, call_id: &str, arguments: serde_json::Value, ts: u64) -> Event {
    Event::new(
        EventPayload::LlmToolCall {
            tool_name: tool_name.to_string(),
            call_id: call_id.to_string(),
            arguments,
        },
        ts,
    )
}

pub fn tool_result_event(call_id: &str, success: bool, result: serde_json::Value, ts: u64) -> Event {
    Event::new(
        EventPayload::ToolResult {
            call_id: call_id.to_string(),
            success,
            result,
        },
        ts,
    )
}

pub fn subagent_spawned_event(agent_name: &str, task: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::SubagentSpawned {
            agent_name: agent_name.to_string(),
            task: task.to_string(),
            child_thread_id: None,
        },
        ts,
    )
}

pub fn subagent_result_event(agent_name: &str, result: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::SubagentResult {
            agent_name: agent_name.to_string(),
            result: result.to_string(),
            success: true,
        },
        ts,
    )
}

pub fn task_completed_event(result: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::TaskCompleted {
            result: result.to_string(),
        },
        ts,
    )
}

pub fn task_abandoned_event(reason: &str, ts: u64) -> Event {
    Event::new(
        EventPayload::TaskAbandoned {
            reason: reason.to_string(),
        },
        ts,
    )
}

pub fn mark_critical_event(chunk_id: &crate::chunk::ChunkId, ts: u64) -> Event {
    Event::new(
        EventPayload::MemoryMarkCritical {
            chunk_id: chunk_id.clone(),
        },
        ts,
    )
}

pub fn forget_event(chunk_id: &crate::chunk::ChunkId, ts: u64) -> Event {
    Event::new(
        EventPayload::MemoryForget {
            chunk_id: chunk_id.clone(),
        },
        ts,
    )
}

// ── Chunk and state factories ───────────────────────────────────────────────

pub fn text_chunk(kind: ChunkKind, text: &str) -> Chunk {
    Chunk::builder(kind, ChunkContent::text(text)).build()
}

/// A state holding the given chunks at top level, in order.
pub fn state_with_chunks(thread_id: ThreadId, chunks: Vec<Chunk>) -> State {
    let mut state = State::initial(thread_id);
    for chunk in chunks {
        state.chunk_ids.push(chunk.id.clone());
        state.chunks.insert(chunk.id.clone(), chunk);
    }
    state
}

/// A thread plus its empty initial state.
pub fn thread_with_initial_state() -> (Thread, State) {
    let thread_id = ThreadId::new();
    let state = State::initial(thread_id.clone());
    let thread = Thread::new(thread_id, state.id.clone(), 1_000_000);
    (thread, state)
}
