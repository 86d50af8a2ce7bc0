// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory-control reducer: explicit retention changes and deletions.
//!
//! `memory:mark_critical` derives the target with `Critical` retention and
//! supersedes it via `Update`. `memory:forget` emits a bare `Delete`; the
//! transition layer enforces existence.

use crate::error::ReducerError;
use crate::registry::{Reducer, ReducerOutput};
use engram_core::{Event, EventPayload, Operation, Retention, State};

pub struct MemoryControlReducer;

impl MemoryControlReducer {
    const NAME: &'static str = "memory_control";
}

impl Reducer for MemoryControlReducer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn accepts(&self, event: &Event) -> bool {
        matches!(
            event.payload,
            EventPayload::MemoryMarkCritical { .. } | EventPayload::MemoryForget { .. }
        )
    }

    fn reduce(&self, state: &State, event: &Event) -> Result<ReducerOutput, ReducerError> {
        let ts = event.timestamp_ms;
        match &event.payload {
            EventPayload::MemoryMarkCritical { chunk_id } => {
                let target = state.get_chunk(chunk_id).ok_or_else(|| {
                    ReducerError::new(Self::NAME, format!("chunk not found: {chunk_id}"))
                })?;
                if target.retention == Retention::Critical {
                    return Ok(ReducerOutput::default());
                }
                let pinned = target
                    .derive()
                    .retention(Retention::Critical)
                    .source_operation(Self::NAME)
                    .build();
                Ok(ReducerOutput {
                    operations: vec![Operation::update(
                        chunk_id.clone(),
                        pinned.id.clone(),
                        ts,
                    )],
                    chunks: vec![pinned],
                })
            }
            EventPayload::MemoryForget { chunk_id } => Ok(ReducerOutput {
                operations: vec![Operation::delete(chunk_id.clone(), ts)],
                chunks: vec![],
            }),
            _ => Ok(ReducerOutput::default()),
        }
    }
}

#[cfg(test)]
#[path = "memory_control_tests.rs"]
mod tests;
