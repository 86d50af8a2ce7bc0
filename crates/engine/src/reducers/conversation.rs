// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation reducer: folds dialogue events into the working history.
//!
//! Each accepted event becomes one leaf chunk. A single `WorkingHistory`
//! container per state holds the leaves in order: when one exists, the leaf
//! is attached via `AddChild` and the container is superseded via `Update`
//! (its `child_ids` grows); otherwise a fresh container is created around
//! the first leaf.

use crate::error::ReducerError;
use crate::registry::{Reducer, ReducerOutput};
use engram_core::{
    Chunk, ChunkContent, ChunkKind, Event, EventPayload, Operation, State,
};

pub struct ConversationReducer;

impl ConversationReducer {
    const NAME: &'static str = "conversation";

    /// Leaf kind and content for an accepted event.
    fn leaf_for(event: &Event) -> Option<(ChunkKind, ChunkContent)> {
        let structured = |pairs: Vec<(&str, serde_json::Value)>| {
            let mut fields = serde_json::Map::new();
            for (k, v) in pairs {
                fields.insert(k.to_string(), v);
            }
            ChunkContent::Structured { fields }
        };

        match &event.payload {
            EventPayload::UserMessage { content } => {
                Some((ChunkKind::UserMessage, ChunkContent::text(content)))
            }
            EventPayload::LlmTextResponse { content } => {
                Some((ChunkKind::AgentResponse, ChunkContent::text(content)))
            }
            EventPayload::Thinking { content } => {
                Some((ChunkKind::Thinking, ChunkContent::text(content)))
            }
            EventPayload::LlmToolCall {
                tool_name,
                call_id,
                arguments,
            } => Some((
                ChunkKind::AgentAction,
                structured(vec![
                    ("tool_name", serde_json::json!(tool_name)),
                    ("call_id", serde_json::json!(call_id)),
                    ("arguments", arguments.clone()),
                ]),
            )),
            EventPayload::ToolResult {
                call_id,
                success,
                result,
            } => Some((
                ChunkKind::ActionResponse,
                structured(vec![
                    ("call_id", serde_json::json!(call_id)),
                    ("success", serde_json::json!(success)),
                    ("result", result.clone()),
                ]),
            )),
            EventPayload::SubagentSpawned {
                agent_name, task, ..
            } => Some((
                ChunkKind::SubagentSpawn,
                structured(vec![
                    ("agent_name", serde_json::json!(agent_name)),
                    ("task", serde_json::json!(task)),
                ]),
            )),
            EventPayload::SubagentResult {
                agent_name,
                result,
                success,
            } => Some((
                ChunkKind::SubagentResult,
                structured(vec![
                    ("agent_name", serde_json::json!(agent_name)),
                    ("result", serde_json::json!(result)),
                    ("success", serde_json::json!(success)),
                ]),
            )),
            EventPayload::ParentMessage { content } => {
                Some((ChunkKind::ParentMessage, ChunkContent::text(content)))
            }
            _ => None,
        }
    }
}

impl Reducer for ConversationReducer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn accepts(&self, event: &Event) -> bool {
        Self::leaf_for(event).is_some()
    }

    fn reduce(&self, state: &State, event: &Event) -> Result<ReducerOutput, ReducerError> {
        let Some((kind, content)) = Self::leaf_for(event) else {
            return Ok(ReducerOutput::default());
        };
        let ts = event.timestamp_ms;

        let leaf = Chunk::builder(kind, content)
            .as_child()
            .created_at_ms(ts)
            .source_operation(Self::NAME)
            .build();

        let mut output = ReducerOutput::default();
        match state.working_history() {
            Some(container) => {
                let grown = container
                    .derive()
                    .push_child(leaf.id.clone())
                    .source_operation(Self::NAME)
                    .build();
                output
                    .operations
                    .push(Operation::add_child(container.id.clone(), leaf.id.clone(), ts));
                output
                    .operations
                    .push(Operation::update(container.id.clone(), grown.id.clone(), ts));
                output.chunks.push(leaf);
                output.chunks.push(grown);
            }
            None => {
                let container =
                    Chunk::builder(ChunkKind::WorkingHistory, ChunkContent::text(""))
                        .children(vec![leaf.id.clone()])
                        .created_at_ms(ts)
                        .source_operation(Self::NAME)
                        .build();
                output
                    .operations
                    .push(Operation::add(container.id.clone(), ts));
                output
                    .operations
                    .push(Operation::add_child(container.id.clone(), leaf.id.clone(), ts));
                output.chunks.push(container);
                output.chunks.push(leaf);
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
