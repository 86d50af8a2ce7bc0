// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle reducer: task end events become critical `Output` chunks.

use crate::error::ReducerError;
use crate::registry::{Reducer, ReducerOutput};
use engram_core::{
    Chunk, ChunkContent, ChunkKind, Event, EventPayload, Operation, Retention, State,
};

pub struct LifecycleReducer;

impl LifecycleReducer {
    const NAME: &'static str = "lifecycle";

    fn output_text(event: &Event) -> Option<(String, &'static str)> {
        match &event.payload {
            EventPayload::TaskCompleted { result } => Some((result.clone(), "completed")),
            EventPayload::TaskAbandoned { reason } => Some((reason.clone(), "abandoned")),
            EventPayload::TaskTerminated { reason } => Some((
                reason.clone().unwrap_or_else(|| "terminated".to_string()),
                "terminated",
            )),
            _ => None,
        }
    }
}

impl Reducer for LifecycleReducer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn accepts(&self, event: &Event) -> bool {
        event.payload.is_lifecycle()
    }

    fn reduce(&self, _state: &State, event: &Event) -> Result<ReducerOutput, ReducerError> {
        let Some((text, outcome)) = Self::output_text(event) else {
            return Ok(ReducerOutput::default());
        };

        let chunk = Chunk::builder(ChunkKind::Output, ChunkContent::text(text))
            .retention(Retention::Critical)
            .created_at_ms(event.timestamp_ms)
            .source_operation(Self::NAME)
            .custom("outcome", serde_json::json!(outcome))
            .build();

        Ok(ReducerOutput {
            operations: vec![Operation::add(chunk.id.clone(), event.timestamp_ms)],
            chunks: vec![chunk],
        })
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
