// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory storage backend.

use crate::store::{Storage, StorageError};
use async_trait::async_trait;
use engram_core::{
    Chunk, ChunkId, QueuedEvent, State, StateId, Step, StepId, Thread, ThreadId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    threads: HashMap<ThreadId, Thread>,
    states: HashMap<StateId, State>,
    /// Per-thread state ids in insertion order.
    state_order: HashMap<ThreadId, Vec<StateId>>,
    chunks: HashMap<ChunkId, Chunk>,
    steps: HashMap<StepId, Step>,
    /// Per-thread step ids in insertion order.
    step_order: HashMap<ThreadId, Vec<StepId>>,
}

/// HashMap-table backend. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored threads (test introspection).
    pub fn thread_count(&self) -> usize {
        self.tables.read().threads.len()
    }

    /// Number of stored chunks (test introspection).
    pub fn chunk_count(&self) -> usize {
        self.tables.read().chunks.len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, StorageError> {
        Ok(self.tables.read().threads.get(id).cloned())
    }

    async fn save_thread(&self, thread: &Thread) -> Result<(), StorageError> {
        self.tables
            .write()
            .threads
            .insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn delete_thread(&self, id: &ThreadId) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        tables.threads.remove(id);

        if let Some(state_ids) = tables.state_order.remove(id) {
            for state_id in &state_ids {
                if let Some(state) = tables.states.remove(state_id) {
                    for chunk_id in state.chunks.keys() {
                        tables.chunks.remove(chunk_id);
                    }
                }
            }
        }
        if let Some(step_ids) = tables.step_order.remove(id) {
            for step_id in &step_ids {
                tables.steps.remove(step_id);
            }
        }
        Ok(())
    }

    async fn get_state(&self, id: &StateId) -> Result<Option<State>, StorageError> {
        Ok(self.tables.read().states.get(id).cloned())
    }

    async fn save_state(&self, state: &State) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let order = tables
            .state_order
            .entry(state.thread_id.clone())
            .or_default();
        if !order.contains(&state.id) {
            order.push(state.id.clone());
        }
        tables.states.insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn get_states_by_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<State>, StorageError> {
        let tables = self.tables.read();
        let ids = tables.state_order.get(thread_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| tables.states.get(id).cloned())
            .collect())
    }

    async fn get_chunk(&self, id: &ChunkId) -> Result<Option<Chunk>, StorageError> {
        Ok(self.tables.read().chunks.get(id).cloned())
    }

    async fn save_chunk(&self, chunk: &Chunk) -> Result<(), StorageError> {
        self.tables
            .write()
            .chunks
            .insert(chunk.id.clone(), chunk.clone());
        Ok(())
    }

    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>, StorageError> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.chunks.get(id).cloned())
            .collect())
    }

    async fn get_step(&self, id: &StepId) -> Result<Option<Step>, StorageError> {
        Ok(self.tables.read().steps.get(id).cloned())
    }

    async fn save_step(&self, step: &Step) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let order = tables
            .step_order
            .entry(step.thread_id.clone())
            .or_default();
        if !order.contains(&step.id) {
            order.push(step.id.clone());
        }
        tables.steps.insert(step.id.clone(), step.clone());
        Ok(())
    }

    async fn update_step(&self, step: &Step) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        if !tables.steps.contains_key(&step.id) {
            return Err(StorageError::not_found("step", &step.id));
        }
        tables.steps.insert(step.id.clone(), step.clone());
        Ok(())
    }

    async fn get_steps_by_thread(&self, thread_id: &ThreadId) -> Result<Vec<Step>, StorageError> {
        let tables = self.tables.read();
        let ids = tables.step_order.get(thread_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| tables.steps.get(id).cloned())
            .collect())
    }

    async fn get_event_queue(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<QueuedEvent>, StorageError> {
        let tables = self.tables.read();
        let thread = tables
            .threads
            .get(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        Ok(thread.event_queue.clone())
    }

    async fn push_event(
        &self,
        thread_id: &ThreadId,
        entry: QueuedEvent,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let thread = tables
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        thread.event_queue.push(entry);
        Ok(())
    }

    async fn pop_event(&self, thread_id: &ThreadId) -> Result<Option<QueuedEvent>, StorageError> {
        let mut tables = self.tables.write();
        let thread = tables
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        if thread.event_queue.is_empty() {
            return Ok(None);
        }
        Ok(Some(thread.event_queue.remove(0)))
    }

    async fn peek_event(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<QueuedEvent>, StorageError> {
        let tables = self.tables.read();
        let thread = tables
            .threads
            .get(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        Ok(thread.event_queue.first().cloned())
    }

    async fn event_queue_len(&self, thread_id: &ThreadId) -> Result<usize, StorageError> {
        let tables = self.tables.read();
        let thread = tables
            .threads
            .get(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        Ok(thread.event_queue.len())
    }

    async fn clear_event_queue(&self, thread_id: &ThreadId) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let thread = tables
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::not_found("thread", thread_id))?;
        thread.event_queue.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
