// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage interface for threads, states, chunks, steps, and event queues.

use async_trait::async_trait;
use engram_core::{
    Chunk, ChunkId, QueuedEvent, State, StateId, Step, StepId, Thread, ThreadId,
};
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Key/value-style persistence keyed by id, with thread-scoped indices.
///
/// The queue operations act on the list embedded in the thread record;
/// `get_states_by_thread` and `get_steps_by_thread` return insertion order.
/// A durable implementation must provide read-back of committed writes;
/// [`crate::MemoryStorage`] satisfies every test.
#[async_trait]
pub trait Storage: Send + Sync {
    // -- threads --
    async fn get_thread(&self, id: &ThreadId) -> Result<Option<Thread>, StorageError>;
    async fn save_thread(&self, thread: &Thread) -> Result<(), StorageError>;
    /// Delete a thread and cascade to its states, chunks, steps, and queue.
    async fn delete_thread(&self, id: &ThreadId) -> Result<(), StorageError>;

    // -- states --
    async fn get_state(&self, id: &StateId) -> Result<Option<State>, StorageError>;
    async fn save_state(&self, state: &State) -> Result<(), StorageError>;
    async fn get_states_by_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<State>, StorageError>;

    // -- chunks --
    async fn get_chunk(&self, id: &ChunkId) -> Result<Option<Chunk>, StorageError>;
    async fn save_chunk(&self, chunk: &Chunk) -> Result<(), StorageError>;
    /// Resolve many chunks; absent ids are skipped, order follows `ids`.
    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>, StorageError>;

    // -- steps --
    async fn get_step(&self, id: &StepId) -> Result<Option<Step>, StorageError>;
    async fn save_step(&self, step: &Step) -> Result<(), StorageError>;
    /// Overwrite an existing step; errors if the step was never saved.
    async fn update_step(&self, step: &Step) -> Result<(), StorageError>;
    async fn get_steps_by_thread(&self, thread_id: &ThreadId) -> Result<Vec<Step>, StorageError>;

    // -- event queue (thread-scoped, FIFO) --
    async fn get_event_queue(&self, thread_id: &ThreadId)
        -> Result<Vec<QueuedEvent>, StorageError>;
    async fn push_event(
        &self,
        thread_id: &ThreadId,
        entry: QueuedEvent,
    ) -> Result<(), StorageError>;
    async fn pop_event(&self, thread_id: &ThreadId) -> Result<Option<QueuedEvent>, StorageError>;
    async fn peek_event(&self, thread_id: &ThreadId)
        -> Result<Option<QueuedEvent>, StorageError>;
    async fn event_queue_len(&self, thread_id: &ThreadId) -> Result<usize, StorageError>;
    async fn clear_event_queue(&self, thread_id: &ThreadId) -> Result<(), StorageError>;
}
