// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-event processing core.
//!
//! One call processes exactly one queued event: step record, reduce,
//! transition, observer fan-out, budget inspection. Pending compaction and
//! truncation are recorded for the orchestrator, never executed here.

use crate::compaction::{BudgetCheck, CompactionManager};
use crate::error::EngineError;
use crate::mode::ExecutionModeController;
use crate::observer::{ObserverManager, StateChange};
use crate::registry::{ReducerOutput, ReducerRegistry};
use crate::steps;
use crate::transition::{self, TransitionContext};
use engram_core::{
    Chunk, ChunkId, Clock, DispatchStrategy, EventPayload, Provenance, ProvenanceSource,
    QueuedEvent, State, Thread, ThreadId,
};
use engram_storage::Storage;
use std::sync::Arc;
use tracing::{error, info_span};

/// Result of processing one event (or a no-op snapshot of the thread).
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub thread: Thread,
    pub state: State,
    pub added_chunks: Vec<Chunk>,
    pub removed_chunk_ids: Vec<ChunkId>,
    pub should_terminate: bool,
    pub should_interrupt: bool,
    pub strategy: DispatchStrategy,
}

impl DispatchOutcome {
    /// A result that changed nothing: current thread and state, no deltas.
    pub fn noop(thread: Thread, state: State, strategy: DispatchStrategy) -> Self {
        Self {
            thread,
            state,
            added_chunks: Vec::new(),
            removed_chunk_ids: Vec::new(),
            should_terminate: strategy == DispatchStrategy::Terminate,
            should_interrupt: strategy == DispatchStrategy::Interrupt,
            strategy,
        }
    }
}

/// Processes one event end-to-end.
pub struct EventProcessor<C: Clock> {
    storage: Arc<dyn Storage>,
    registry: Arc<ReducerRegistry>,
    compaction: Arc<CompactionManager>,
    observers: Arc<ObserverManager>,
    modes: Arc<ExecutionModeController>,
    clock: C,
}

impl<C: Clock> EventProcessor<C> {
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: Arc<ReducerRegistry>,
        compaction: Arc<CompactionManager>,
        observers: Arc<ObserverManager>,
        modes: Arc<ExecutionModeController>,
        clock: C,
    ) -> Self {
        Self {
            storage,
            registry,
            compaction,
            observers,
            modes,
            clock,
        }
    }

    /// Process exactly one event for the thread.
    pub async fn process_event(
        &self,
        thread_id: &ThreadId,
        entry: QueuedEvent,
    ) -> Result<DispatchOutcome, EngineError> {
        let event = &entry.event;
        let span = info_span!("event", thread_id = %thread_id, kind = event.kind());
        let _guard = span.enter();

        let mut thread = self
            .storage
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| EngineError::not_found("thread", thread_id))?;

        let mut step = steps::begin_step(
            &self.storage,
            &mut thread,
            event.kind(),
            serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            self.clock.epoch_ms(),
        )
        .await?;

        match self.run_step(&mut thread, &step, &entry).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(step_id = %step.id, error = %e, "event processing failed");
                steps::fail_step(
                    &self.storage,
                    &mut thread,
                    &mut step,
                    &e.to_string(),
                    self.clock.epoch_ms(),
                )
                .await;
                self.observers.error(Some(thread_id), &e.to_string());
                Err(e)
            }
        }
    }

    /// The fallible middle of a step; the caller owns fail/complete.
    async fn run_step(
        &self,
        thread: &mut Thread,
        step: &engram_core::Step,
        entry: &QueuedEvent,
    ) -> Result<DispatchOutcome, EngineError> {
        let event = &entry.event;
        let thread_id = thread.id.clone();

        let state = self
            .storage
            .get_state(&thread.current_state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", &thread.current_state_id))?;

        let strategy = event.effective_strategy();
        if strategy != DispatchStrategy::Silent {
            self.observers.event_dispatched(&thread_id, event);
        }

        // Reduce, timing each accepting reducer for the observers.
        let mut output = ReducerOutput::default();
        let mut reducer_names: Vec<&'static str> = Vec::new();
        for reducer in self.registry.accepting(event) {
            let started = self.clock.now();
            let partial = reducer.reduce(&state, event)?;
            self.observers
                .reducer_executed(&thread_id, reducer.name(), started.elapsed());
            reducer_names.push(reducer.name());
            output.merge(partial);
        }

        // No operations: complete against the unchanged state.
        if output.is_empty() {
            let mut step = step.clone();
            steps::complete_step_noop(
                &self.storage,
                thread,
                &mut step,
                state.id.clone(),
                self.clock.epoch_ms(),
            )
            .await?;
            return Ok(DispatchOutcome::noop(thread.clone(), state, strategy));
        }

        let source_operation = reducer_names.join("+");
        let ctx = TransitionContext {
            provenance: Provenance::new(ProvenanceSource::Reducer, event.timestamp_ms)
                .with_event(entry.event_id.clone(), event.kind())
                .with_step(step.id.clone())
                .with_context(serde_json::json!({ "strategy": strategy.to_string() })),
            source_operation: source_operation.clone(),
            requirement: event.effective_requirement(),
        };
        let result = transition::apply(&state, &output, ctx)?;

        let mut step = step.clone();
        steps::commit_step(
            &self.storage,
            thread,
            &mut step,
            &result.state,
            &result.added_chunks,
            self.clock.epoch_ms(),
        )
        .await?;

        self.observers.state_changed(&StateChange {
            thread_id: &thread_id,
            previous_state_id: &state.id,
            new_state_id: &result.state.id,
            trigger: Some(event),
            source: &source_operation,
        });
        if let EventPayload::SubagentSpawned { agent_name, .. } = &event.payload {
            // The new state id anchors the sub-agent to its parent memory.
            self.observers
                .subagent_spawned(&thread_id, &result.state.id, agent_name);
        }
        if let EventPayload::SubagentResult { agent_name, .. } = &event.payload {
            self.observers.subagent_result(&thread_id, agent_name);
        }

        // Inspect the post-event budget; record pressure, never act on it.
        match self.compaction.check_token_usage(&result.state) {
            BudgetCheck::ForceCompaction { chunks, .. } => {
                self.modes.set_pending_compaction(&thread_id, chunks);
            }
            BudgetCheck::NeedsTruncation { chunk_ids, .. } => {
                self.modes.set_pending_truncation(&thread_id, chunk_ids);
            }
            BudgetCheck::SoftWarning { usage } => {
                tracing::debug!(
                    thread_id = %thread_id,
                    total_tokens = usage.total,
                    "soft token threshold exceeded"
                );
            }
            BudgetCheck::NoAction { .. } => {}
        }

        Ok(DispatchOutcome {
            thread: thread.clone(),
            state: result.state,
            added_chunks: result.added_chunks,
            removed_chunk_ids: result.removed_chunk_ids,
            should_terminate: strategy == DispatchStrategy::Terminate,
            should_interrupt: strategy == DispatchStrategy::Interrupt,
            strategy,
        })
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
