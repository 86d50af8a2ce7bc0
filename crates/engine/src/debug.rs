// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug controller: pause/step, fork, chunk edits, snapshots.

use crate::error::EngineError;
use crate::mode::ExecutionMode;
use crate::observer::StateChange;
use crate::orchestrator::Orchestrator;
use crate::processor::DispatchOutcome;
use crate::registry::ReducerOutput;
use crate::steps;
use crate::transition::{self, TransitionContext};
use engram_core::{
    ChunkContent, ChunkId, Clock, Event, LlmResponseRequirement, Operation, Provenance,
    ProvenanceSource, QueuedEvent, State, StateId, StateMetadata, Thread, ThreadId,
    ThreadSnapshot,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Debugging surface over a running orchestrator.
pub struct DebugController<C: Clock> {
    orchestrator: Arc<Orchestrator<C>>,
    paused: Mutex<HashSet<ThreadId>>,
}

impl<C: Clock> DebugController<C> {
    pub fn new(orchestrator: Arc<Orchestrator<C>>) -> Self {
        Self {
            orchestrator,
            paused: Mutex::new(HashSet::new()),
        }
    }

    // ── Pause and stepping ──────────────────────────────────────────────────

    /// Mark the thread paused and flip it to stepping mode. The actual
    /// blocking comes from the mode flag and the step lock.
    pub fn pause(&self, thread_id: &ThreadId) {
        self.paused.lock().insert(thread_id.clone());
        self.orchestrator
            .modes()
            .set_mode(thread_id, ExecutionMode::Stepping);
        info!(thread_id = %thread_id, "thread paused");
    }

    /// Clear the paused mark and return the thread to auto mode. Queued
    /// events stay queued until the next dispatch or step.
    pub fn resume(&self, thread_id: &ThreadId) {
        self.paused.lock().remove(thread_id);
        self.orchestrator
            .modes()
            .set_mode(thread_id, ExecutionMode::Auto);
        info!(thread_id = %thread_id, "thread resumed");
    }

    pub fn is_paused(&self, thread_id: &ThreadId) -> bool {
        self.paused.lock().contains(thread_id)
    }

    /// Execute one pending operation or queued event (stepping mode).
    pub async fn step(&self, thread_id: &ThreadId) -> Result<DispatchOutcome, EngineError> {
        self.orchestrator.manual_step(thread_id).await
    }

    pub fn execution_mode(&self, thread_id: &ThreadId) -> ExecutionMode {
        self.orchestrator.modes().mode(thread_id)
    }

    pub fn set_execution_mode(&self, thread_id: &ThreadId, mode: ExecutionMode) {
        self.orchestrator.modes().set_mode(thread_id, mode);
    }

    /// Passthrough to the dispatcher.
    pub async fn inject_event(
        &self,
        thread_id: &ThreadId,
        event: Event,
    ) -> Result<DispatchOutcome, EngineError> {
        self.orchestrator.dispatch(thread_id, event).await
    }

    // ── Forking ─────────────────────────────────────────────────────────────

    /// Create a new thread seeded with the chunks of an existing state.
    ///
    /// The fork shares no mutable structure with the source: later work on
    /// either thread cannot affect the other.
    pub async fn fork_from_state(
        &self,
        thread_id: &ThreadId,
        state_id: &StateId,
    ) -> Result<Thread, EngineError> {
        let storage = self.orchestrator.storage();
        let source = storage
            .get_state(state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", state_id))?;
        if &source.thread_id != thread_id {
            return Err(EngineError::invariant(format!(
                "state {state_id} does not belong to {thread_id}"
            )));
        }

        let now = self.orchestrator.clock().epoch_ms();
        let new_thread_id = ThreadId::new();
        let forked_from = serde_json::json!({
            "thread_id": thread_id,
            "state_id": state_id,
        });

        let state = State {
            id: StateId::new(),
            thread_id: new_thread_id.clone(),
            chunk_ids: source.chunk_ids.clone(),
            chunks: source.chunks.clone(),
            metadata: StateMetadata {
                previous_state_id: None,
                source_operation: Some("fork".to_string()),
                provenance: Some(
                    Provenance::new(ProvenanceSource::Fork, now)
                        .with_context(serde_json::json!({ "forked_from": forked_from })),
                ),
            },
            need_llm_continue_response: source.need_llm_continue_response,
        };

        let mut thread = Thread::new(new_thread_id, state.id.clone(), now);
        thread
            .metadata
            .custom
            .insert("forked_from".to_string(), forked_from);

        storage.save_state(&state).await?;
        storage.save_thread(&thread).await?;
        info!(
            source = %thread_id,
            state = %state_id,
            fork = %thread.id,
            "thread forked"
        );
        Ok(thread)
    }

    // ── Chunk editing ───────────────────────────────────────────────────────

    /// Derive an edited copy of a chunk and swap it into the thread's
    /// current state. The original chunk (and the source state) stay intact.
    pub async fn edit_chunk(
        &self,
        thread_id: &ThreadId,
        state_id: &StateId,
        chunk_id: &ChunkId,
        new_content: ChunkContent,
    ) -> Result<State, EngineError> {
        let storage = self.orchestrator.storage();
        let located = storage
            .get_state(state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", state_id))?;
        let original = located
            .get_chunk(chunk_id)
            .ok_or_else(|| EngineError::not_found("chunk", chunk_id))?;

        let now = self.orchestrator.clock().epoch_ms();
        let edited = original
            .derive()
            .content(new_content)
            .created_at_ms(now)
            .source_operation("edit")
            .build();

        let (mut thread, current) = self.orchestrator.load_current(thread_id).await?;

        let mut output = ReducerOutput {
            operations: vec![Operation::update(
                chunk_id.clone(),
                edited.id.clone(),
                now,
            )],
            chunks: vec![edited.clone()],
        };

        // A leaf edit also rewrites the container that references it, so the
        // successor state has no dangling child ids.
        if !current.chunk_ids.contains(chunk_id) {
            if let Some(container) = current.chunks.values().find(|c| {
                c.child_ids
                    .as_deref()
                    .is_some_and(|children| children.contains(chunk_id))
            }) {
                let mut child_ids = container.child_ids.clone().unwrap_or_default();
                for id in child_ids.iter_mut() {
                    if id == chunk_id {
                        *id = edited.id.clone();
                    }
                }
                let rewritten = container
                    .derive()
                    .children(child_ids)
                    .source_operation("edit")
                    .build();
                output.operations.push(Operation::update(
                    container.id.clone(),
                    rewritten.id.clone(),
                    now,
                ));
                output.chunks.push(rewritten);
            }
        }

        let mut step = steps::begin_step(
            storage,
            &mut thread,
            "debug:edit",
            serde_json::json!({ "chunk_id": chunk_id, "state_id": state_id }),
            now,
        )
        .await?;

        let ctx = TransitionContext {
            provenance: Provenance::new(ProvenanceSource::Edit, now)
                .with_step(step.id.clone())
                .with_context(serde_json::json!({ "edited_chunk": chunk_id })),
            source_operation: "edit".to_string(),
            requirement: LlmResponseRequirement::Keep,
        };

        let result = match transition::apply(&current, &output, ctx) {
            Ok(result) => result,
            Err(e) => {
                steps::fail_step(storage, &mut thread, &mut step, &e.to_string(), now).await;
                return Err(e);
            }
        };

        steps::commit_step(
            storage,
            &mut thread,
            &mut step,
            &result.state,
            &result.added_chunks,
            now,
        )
        .await?;

        self.orchestrator.observers().state_changed(&StateChange {
            thread_id,
            previous_state_id: &current.id,
            new_state_id: &result.state.id,
            trigger: None,
            source: "edit",
        });

        Ok(result.state)
    }

    // ── Snapshots ───────────────────────────────────────────────────────────

    /// Bundle the thread's states and the union of their chunks.
    pub async fn create_snapshot(
        &self,
        thread_id: &ThreadId,
        description: Option<String>,
    ) -> Result<ThreadSnapshot, EngineError> {
        let storage = self.orchestrator.storage();
        let thread = storage
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| EngineError::not_found("thread", thread_id))?;
        let states = storage.get_states_by_thread(thread_id).await?;

        // Union of chunk ids across states, first-seen order.
        let mut seen: HashSet<ChunkId> = HashSet::new();
        let mut ids: Vec<ChunkId> = Vec::new();
        for state in &states {
            for id in state.chunks.keys() {
                if seen.insert(id.clone()) {
                    ids.push(id.clone());
                }
            }
        }

        let mut chunks = storage.get_chunks(&ids).await?;
        // States embed their chunks, so anything the chunk table is missing
        // can still be recovered from the state bodies.
        let resolved: HashSet<ChunkId> = chunks.iter().map(|c| c.id.clone()).collect();
        for state in &states {
            for (id, chunk) in &state.chunks {
                if !resolved.contains(id) && !chunks.iter().any(|c| &c.id == id) {
                    chunks.push(chunk.clone());
                }
            }
        }

        Ok(ThreadSnapshot::new(
            thread_id.clone(),
            thread.current_state_id.clone(),
            states,
            chunks,
            self.orchestrator.clock().epoch_ms(),
            description,
        ))
    }

    /// Rebuild a thread from a snapshot's last state.
    ///
    /// An existing thread with the same id is deleted first.
    pub async fn restore_snapshot(
        &self,
        snapshot: &ThreadSnapshot,
    ) -> Result<Thread, EngineError> {
        let last = snapshot.last_state().ok_or_else(|| {
            EngineError::invariant(format!(
                "snapshot {} does not contain its own state {}",
                snapshot.id, snapshot.state_id
            ))
        })?;

        let storage = self.orchestrator.storage();
        if storage.get_thread(&snapshot.thread_id).await?.is_some() {
            self.orchestrator.delete_thread(&snapshot.thread_id).await?;
        }

        let now = self.orchestrator.clock().epoch_ms();
        let state = State {
            id: StateId::new(),
            thread_id: snapshot.thread_id.clone(),
            chunk_ids: last.chunk_ids.clone(),
            chunks: last.chunks.clone(),
            metadata: StateMetadata {
                previous_state_id: None,
                source_operation: Some("restore".to_string()),
                provenance: Some(
                    Provenance::new(ProvenanceSource::Restore, now)
                        .with_context(serde_json::json!({ "restored_from": snapshot.id })),
                ),
            },
            need_llm_continue_response: last.need_llm_continue_response,
        };

        for chunk in state.chunks.values() {
            storage.save_chunk(chunk).await?;
        }
        storage.save_state(&state).await?;

        let mut thread = Thread::new(snapshot.thread_id.clone(), state.id.clone(), now);
        thread.metadata.custom.insert(
            "restored_from".to_string(),
            serde_json::json!(snapshot.id),
        );
        storage.save_thread(&thread).await?;

        info!(thread_id = %thread.id, snapshot = %snapshot.id, "thread restored");
        Ok(thread)
    }

    // ── Introspection ───────────────────────────────────────────────────────

    pub fn has_pending_compaction(&self, thread_id: &ThreadId) -> bool {
        self.orchestrator.modes().has_pending_compaction(thread_id)
    }

    pub fn has_pending_truncation(&self, thread_id: &ThreadId) -> bool {
        self.orchestrator.modes().has_pending_truncation(thread_id)
    }

    pub async fn queued_event_count(&self, thread_id: &ThreadId) -> Result<usize, EngineError> {
        self.orchestrator.queued_event_count(thread_id).await
    }

    pub async fn peek_next_event(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<QueuedEvent>, EngineError> {
        self.orchestrator.peek_next_event(thread_id).await
    }

    /// Clear a crash-stale step lock (the step record is terminal or gone).
    pub async fn release_stale_lock(&self, thread_id: &ThreadId) -> Result<bool, EngineError> {
        self.orchestrator.release_stale_lock(thread_id).await
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
