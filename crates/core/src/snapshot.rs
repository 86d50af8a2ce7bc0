// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshots: a capture of a thread's states and chunks for later restore.

use crate::chunk::{Chunk, ChunkId};
use crate::state::{State, StateId};
use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

crate::define_id! {
    /// Unique identifier for a snapshot.
    pub struct SnapshotId("snapshot_");
}

/// A bundle of a thread's states plus every chunk they reference.
///
/// Ephemeral unless written out through the storage archive. The JSON layout
/// is the wire format: each state embeds its `chunk_ids` and every chunk is
/// fully serialized, so a restore needs nothing but this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: SnapshotId,
    pub thread_id: ThreadId,
    /// The thread's current state at capture time.
    pub state_id: StateId,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// All states of the thread, insertion order.
    pub states: Vec<State>,
    /// Union of chunks referenced by the states.
    pub chunks: Vec<Chunk>,
}

impl ThreadSnapshot {
    pub fn new(
        thread_id: ThreadId,
        state_id: StateId,
        states: Vec<State>,
        chunks: Vec<Chunk>,
        created_at_ms: u64,
        description: Option<String>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            thread_id,
            state_id,
            created_at_ms,
            description,
            states,
            chunks,
        }
    }

    /// The captured current state, when present in the bundle.
    pub fn last_state(&self) -> Option<&State> {
        self.states.iter().find(|s| s.id == self.state_id)
    }

    /// Ids of every chunk referenced by any state in the bundle.
    pub fn referenced_chunk_ids(&self) -> HashSet<ChunkId> {
        let mut ids = HashSet::new();
        for state in &self.states {
            ids.extend(state.chunks.keys().cloned());
        }
        ids
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
