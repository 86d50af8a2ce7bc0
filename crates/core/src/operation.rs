// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations: declarative state edits produced by reducers.
//!
//! An operation is an instruction, not a mutation. The transition layer
//! interprets them in order against an immutable prior state.

use crate::chunk::ChunkId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an operation.
    pub struct OpId("op_");
}

/// The edit to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert a chunk and append its id to the state's `chunk_ids`.
    Add { chunk_id: ChunkId },

    /// Remove a chunk from both `chunk_ids` and the chunk map.
    Delete { chunk_id: ChunkId },

    /// Replace `old_id` with `new_id` in place, preserving position.
    Update { old_id: ChunkId, new_id: ChunkId },

    /// Replace several chunks with one, inserted at the first old position.
    BatchReplace {
        old_ids: Vec<ChunkId>,
        new_id: ChunkId,
    },

    /// Insert a chunk into the map as a child of a container (not listed in
    /// `chunk_ids`; the container's `child_ids` references it).
    AddChild {
        parent_id: ChunkId,
        child_id: ChunkId,
    },
}

/// A declarative edit with identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OpId,
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(kind: OperationKind, timestamp_ms: u64) -> Self {
        Self {
            id: OpId::new(),
            timestamp_ms,
            kind,
        }
    }

    pub fn add(chunk_id: ChunkId, timestamp_ms: u64) -> Self {
        Self::new(OperationKind::Add { chunk_id }, timestamp_ms)
    }

    pub fn delete(chunk_id: ChunkId, timestamp_ms: u64) -> Self {
        Self::new(OperationKind::Delete { chunk_id }, timestamp_ms)
    }

    pub fn update(old_id: ChunkId, new_id: ChunkId, timestamp_ms: u64) -> Self {
        Self::new(OperationKind::Update { old_id, new_id }, timestamp_ms)
    }

    pub fn batch_replace(old_ids: Vec<ChunkId>, new_id: ChunkId, timestamp_ms: u64) -> Self {
        Self::new(OperationKind::BatchReplace { old_ids, new_id }, timestamp_ms)
    }

    pub fn add_child(parent_id: ChunkId, child_id: ChunkId, timestamp_ms: u64) -> Self {
        Self::new(
            OperationKind::AddChild {
                parent_id,
                child_id,
            },
            timestamp_ms,
        )
    }

    /// Operation name for log spans (e.g. "add", "batch_replace")
    pub fn name(&self) -> &'static str {
        match &self.kind {
            OperationKind::Add { .. } => "add",
            OperationKind::Delete { .. } => "delete",
            OperationKind::Update { .. } => "update",
            OperationKind::BatchReplace { .. } => "batch_replace",
            OperationKind::AddChild { .. } => "add_child",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match &self.kind {
            OperationKind::Add { chunk_id } => vec![("chunk_id", chunk_id.to_string())],
            OperationKind::Delete { chunk_id } => vec![("chunk_id", chunk_id.to_string())],
            OperationKind::Update { old_id, new_id } => vec![
                ("old_id", old_id.to_string()),
                ("new_id", new_id.to_string()),
            ],
            OperationKind::BatchReplace { old_ids, new_id } => vec![
                ("old_count", old_ids.len().to_string()),
                ("new_id", new_id.to_string()),
            ],
            OperationKind::AddChild {
                parent_id,
                child_id,
            } => vec![
                ("parent_id", parent_id.to_string()),
                ("child_id", child_id.to_string()),
            ],
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
