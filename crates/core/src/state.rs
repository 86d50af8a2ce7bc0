// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! States: immutable snapshots of a thread's working memory.

use crate::chunk::{Chunk, ChunkId, ChunkKind};
use crate::event::EventId;
use crate::step::StepId;
use crate::thread::ThreadId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a state.
    pub struct StateId("state_");
}

/// What produced a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    /// A reducer handled an event.
    Reducer,
    /// The compaction manager replaced chunks with a summary.
    Compaction,
    /// The compaction manager deleted chunks to restore the budget.
    Truncation,
    /// A debug fork seeded this thread from another thread's state.
    Fork,
    /// The thread was rebuilt from a snapshot.
    Restore,
    /// A debug chunk edit.
    Edit,
}

impl fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvenanceSource::Reducer => write!(f, "reducer"),
            ProvenanceSource::Compaction => write!(f, "compaction"),
            ProvenanceSource::Truncation => write!(f, "truncation"),
            ProvenanceSource::Fork => write!(f, "fork"),
            ProvenanceSource::Restore => write!(f, "restore"),
            ProvenanceSource::Edit => write!(f, "edit"),
        }
    }
}

/// Full record of the transition that produced a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: ProvenanceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Event-specific context (forked-from ids, compaction window, …).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

impl Provenance {
    pub fn new(source: ProvenanceSource, timestamp_ms: u64) -> Self {
        Self {
            source,
            event_id: None,
            event_kind: None,
            step_id: None,
            timestamp_ms,
            context: serde_json::Value::Null,
        }
    }

    pub fn with_event(mut self, event_id: EventId, event_kind: impl Into<String>) -> Self {
        self.event_id = Some(event_id);
        self.event_kind = Some(event_kind.into());
        self
    }

    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// State bookkeeping: predecessor link and provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state_id: Option<StateId>,
    /// Name of the operation family that produced this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// An immutable snapshot of a thread's memory.
///
/// `chunk_ids` orders the top-level chunks; `chunks` maps every resident
/// chunk (top-level and container children) by id. Construction seals the
/// value; successors are built by the transition layer, never by mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub thread_id: ThreadId,
    pub chunk_ids: Vec<ChunkId>,
    pub chunks: IndexMap<ChunkId, Chunk>,
    #[serde(default)]
    pub metadata: StateMetadata,
    #[serde(default)]
    pub need_llm_continue_response: bool,
}

impl State {
    /// An empty initial state for a new thread.
    pub fn initial(thread_id: ThreadId) -> Self {
        Self {
            id: StateId::new(),
            thread_id,
            chunk_ids: Vec::new(),
            chunks: IndexMap::new(),
            metadata: StateMetadata::default(),
            need_llm_continue_response: false,
        }
    }

    pub fn get_chunk(&self, id: &ChunkId) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// Top-level chunks in `chunk_ids` order.
    pub fn top_level_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunk_ids.iter().filter_map(|id| self.chunks.get(id))
    }

    /// The single working-history container, if one exists.
    pub fn working_history(&self) -> Option<&Chunk> {
        self.top_level_chunks()
            .find(|c| c.kind == ChunkKind::WorkingHistory)
    }

    /// Resolve a container's children, skipping dangling references.
    pub fn children_of(&self, container: &Chunk) -> Vec<&Chunk> {
        container
            .child_ids
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.chunks.get(id))
            .collect()
    }

    /// Chunk-integrity check: every listed id resolves, and every resident
    /// chunk is either top-level or referenced by a container.
    pub fn check_integrity(&self) -> Result<(), String> {
        for id in &self.chunk_ids {
            if !self.chunks.contains_key(id) {
                return Err(format!("chunk_ids references missing chunk {id}"));
            }
        }
        let mut referenced: std::collections::HashSet<&ChunkId> =
            self.chunk_ids.iter().collect();
        for chunk in self.chunks.values() {
            if let Some(children) = &chunk.child_ids {
                referenced.extend(children.iter());
            }
        }
        for id in self.chunks.keys() {
            if !referenced.contains(id) {
                return Err(format!("chunk {id} is resident but unreferenced"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
