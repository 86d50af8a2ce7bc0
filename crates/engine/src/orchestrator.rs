// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outer dispatch loop.
//!
//! Execution is single-threaded cooperative per thread: events are pushed
//! into the thread's persistent queue, then drained serially in auto mode
//! or consumed one `manual_step` at a time in stepping mode. Budget
//! pressure runs as its own tick with priority truncation > compaction >
//! next event.

use crate::compaction::{BudgetCheck, CompactionManager, HistoryCompactor, TokenThresholds};
use crate::error::EngineError;
use crate::mode::{ExecutionMode, ExecutionModeController};
use crate::observer::{Observer, ObserverManager};
use crate::processor::{DispatchOutcome, EventProcessor};
use crate::registry::ReducerRegistry;
use engram_adapters::ModelClient;
use engram_core::{
    Clock, DispatchStrategy, Event, QueuedEvent, State, StepStatus, SystemClock, Thread, ThreadId,
    Tokenizer,
};
use engram_storage::Storage;
use std::sync::Arc;
use tracing::{info, warn};

/// External collaborators the orchestrator is wired with.
pub struct EngineDeps {
    pub storage: Arc<dyn Storage>,
    pub model: Arc<dyn ModelClient>,
    pub tokenizer: Arc<dyn Tokenizer>,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub thresholds: TokenThresholds,
}

/// The runtime facade: owns the queue discipline, mode flags, observer list,
/// and compaction manager for every thread it serves.
pub struct Orchestrator<C: Clock = SystemClock> {
    storage: Arc<dyn Storage>,
    processor: EventProcessor<C>,
    compaction: Arc<CompactionManager>,
    modes: Arc<ExecutionModeController>,
    observers: Arc<ObserverManager>,
    clock: C,
}

impl<C: Clock> Orchestrator<C> {
    /// Wire up the default pipeline: built-in reducers and the history
    /// compactor backed by the given model client.
    pub fn new(deps: EngineDeps, config: EngineConfig, clock: C) -> Self {
        Self::with_registry(deps, config, clock, ReducerRegistry::with_defaults())
    }

    /// Wire up with a caller-supplied reducer registry.
    pub fn with_registry(
        deps: EngineDeps,
        config: EngineConfig,
        clock: C,
        registry: ReducerRegistry,
    ) -> Self {
        let observers = Arc::new(ObserverManager::new());
        let modes = Arc::new(ExecutionModeController::new());

        let mut compaction = CompactionManager::new(
            Arc::clone(&deps.storage),
            Arc::clone(&deps.tokenizer),
            config.thresholds,
            Arc::clone(&observers),
        );
        compaction.add_compactor(Arc::new(HistoryCompactor::new(Arc::clone(&deps.model))));
        let compaction = Arc::new(compaction);

        let processor = EventProcessor::new(
            Arc::clone(&deps.storage),
            Arc::new(registry),
            Arc::clone(&compaction),
            Arc::clone(&observers),
            Arc::clone(&modes),
            clock.clone(),
        );

        Self {
            storage: deps.storage,
            processor,
            compaction,
            modes,
            observers,
            clock,
        }
    }

    pub fn observers(&self) -> &Arc<ObserverManager> {
        &self.observers
    }

    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.add(observer);
    }

    pub fn modes(&self) -> &Arc<ExecutionModeController> {
        &self.modes
    }

    pub fn compaction(&self) -> &Arc<CompactionManager> {
        &self.compaction
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Create a thread with an empty initial state.
    pub async fn create_thread(&self) -> Result<Thread, EngineError> {
        let now = self.clock.epoch_ms();
        let state = State::initial(ThreadId::new());
        let thread = Thread::new(state.thread_id.clone(), state.id.clone(), now);
        self.storage.save_state(&state).await?;
        self.storage.save_thread(&thread).await?;
        info!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    /// Delete a thread, its history, and its in-process control state.
    pub async fn delete_thread(&self, thread_id: &ThreadId) -> Result<(), EngineError> {
        self.storage.delete_thread(thread_id).await?;
        self.modes.remove_thread(thread_id);
        info!(thread_id = %thread_id, "thread deleted");
        Ok(())
    }

    /// Push an event; drain if the thread is in auto mode, otherwise return
    /// the current snapshot immediately.
    pub async fn dispatch(
        &self,
        thread_id: &ThreadId,
        event: Event,
    ) -> Result<DispatchOutcome, EngineError> {
        let entry = QueuedEvent::new(event, self.clock.epoch_ms());
        self.storage.push_event(thread_id, entry.clone()).await?;
        self.observers.event_queued(thread_id, &entry);

        match self.modes.mode(thread_id) {
            ExecutionMode::Auto => self.drain(thread_id).await,
            ExecutionMode::Stepping => self.snapshot_outcome(thread_id).await,
        }
    }

    /// Sequential dispatch; returns the last result (no-op when empty).
    pub async fn dispatch_all(
        &self,
        thread_id: &ThreadId,
        events: Vec<Event>,
    ) -> Result<DispatchOutcome, EngineError> {
        let mut last = None;
        for event in events {
            last = Some(self.dispatch(thread_id, event).await?);
        }
        match last {
            Some(outcome) => Ok(outcome),
            None => self.snapshot_outcome(thread_id).await,
        }
    }

    /// Drain the queue now (auto mode only). Useful after flipping a thread
    /// back from stepping mode with events still queued.
    pub async fn drain_pending(
        &self,
        thread_id: &ThreadId,
    ) -> Result<DispatchOutcome, EngineError> {
        match self.modes.mode(thread_id) {
            ExecutionMode::Auto => self.drain(thread_id).await,
            ExecutionMode::Stepping => self.snapshot_outcome(thread_id).await,
        }
    }

    /// Execute exactly one pending operation for a stepping-mode thread:
    /// pending truncation, else pending compaction, else one queued event.
    pub async fn manual_step(&self, thread_id: &ThreadId) -> Result<DispatchOutcome, EngineError> {
        if self.modes.mode(thread_id) != ExecutionMode::Stepping {
            return Err(EngineError::Mode(format!(
                "manual step requires stepping mode for {thread_id}"
            )));
        }

        if let Some(chunk_ids) = self.modes.take_pending_truncation(thread_id) {
            self.compaction
                .execute_truncation(thread_id, &chunk_ids, self.clock.epoch_ms())
                .await?;
            return self.snapshot_outcome(thread_id).await;
        }

        if let Some(window) = self.modes.take_pending_compaction(thread_id) {
            self.compaction
                .execute_compaction(thread_id, &window, self.clock.epoch_ms())
                .await?;
            return self.snapshot_outcome(thread_id).await;
        }

        match self.storage.pop_event(thread_id).await? {
            Some(entry) => {
                self.observers.event_dequeued(thread_id, &entry);
                self.processor.process_event(thread_id, entry).await
            }
            None => self.snapshot_outcome(thread_id).await,
        }
    }

    /// Auto-mode loop: budget pressure first, then one event per tick.
    async fn drain(&self, thread_id: &ThreadId) -> Result<DispatchOutcome, EngineError> {
        let mut last: Option<DispatchOutcome> = None;
        // One failed background operation disables further budget checks for
        // this drain call, so a broken compactor can't starve the queue.
        let mut budget_checks_enabled = true;

        loop {
            if self.modes.mode(thread_id) == ExecutionMode::Stepping {
                break;
            }

            if budget_checks_enabled {
                match self.budget_tick(thread_id).await {
                    Ok(Some(outcome)) => {
                        last = Some(outcome);
                        continue;
                    }
                    Ok(None) => {}
                    Err(EngineError::Compactor(e)) => {
                        // Auto mode: report, discard the pending mark, move on.
                        warn!(thread_id = %thread_id, error = %e, "compaction discarded");
                        self.observers.error(Some(thread_id), &e.to_string());
                        self.modes.take_pending_compaction(thread_id);
                        budget_checks_enabled = false;
                    }
                    Err(e) => return Err(e),
                }
            }

            let Some(entry) = self.storage.pop_event(thread_id).await? else {
                break;
            };
            self.observers.event_dequeued(thread_id, &entry);

            let outcome = self.processor.process_event(thread_id, entry).await?;
            let terminate = outcome.should_terminate;
            last = Some(outcome);
            if terminate {
                break;
            }
        }

        match last {
            Some(outcome) => Ok(outcome),
            None => self.snapshot_outcome(thread_id).await,
        }
    }

    /// Run one budget-pressure operation if the current state needs it.
    async fn budget_tick(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<DispatchOutcome>, EngineError> {
        let (_, state) = self.load_current(thread_id).await?;

        match self.compaction.check_token_usage(&state) {
            BudgetCheck::NeedsTruncation { chunk_ids, .. } => {
                self.modes.take_pending_truncation(thread_id);
                let result = self
                    .compaction
                    .execute_truncation(thread_id, &chunk_ids, self.clock.epoch_ms())
                    .await?;
                Ok(Some(DispatchOutcome {
                    thread: self.reload_thread(thread_id).await?,
                    state: result.state,
                    added_chunks: result.added_chunks,
                    removed_chunk_ids: result.removed_chunk_ids,
                    should_terminate: false,
                    should_interrupt: false,
                    strategy: DispatchStrategy::Silent,
                }))
            }
            BudgetCheck::ForceCompaction { chunks, .. } => {
                self.modes.take_pending_compaction(thread_id);
                let result = self
                    .compaction
                    .execute_compaction(thread_id, &chunks, self.clock.epoch_ms())
                    .await?;
                Ok(Some(DispatchOutcome {
                    thread: self.reload_thread(thread_id).await?,
                    state: result.state,
                    added_chunks: result.added_chunks,
                    removed_chunk_ids: result.removed_chunk_ids,
                    should_terminate: false,
                    should_interrupt: false,
                    strategy: DispatchStrategy::Silent,
                }))
            }
            _ => Ok(None),
        }
    }

    /// The current `{thread, state}` as a no-op outcome.
    pub async fn snapshot_outcome(
        &self,
        thread_id: &ThreadId,
    ) -> Result<DispatchOutcome, EngineError> {
        let (thread, state) = self.load_current(thread_id).await?;
        Ok(DispatchOutcome::noop(thread, state, DispatchStrategy::Queue))
    }

    /// Clear a step lock whose step record is terminal (crash recovery).
    ///
    /// Returns true when a stale lock was released. A lock whose step is
    /// still `running` is left alone.
    pub async fn release_stale_lock(&self, thread_id: &ThreadId) -> Result<bool, EngineError> {
        let mut thread = self.reload_thread(thread_id).await?;
        let Some(step_id) = thread.current_step_id.clone() else {
            return Ok(false);
        };

        let stale = match self.storage.get_step(&step_id).await? {
            Some(step) => step.status.is_terminal(),
            None => true,
        };
        if !stale {
            return Ok(false);
        }

        warn!(thread_id = %thread_id, step_id = %step_id, "releasing stale step lock");
        thread.current_step_id = None;
        self.storage.save_thread(&thread).await?;
        Ok(true)
    }

    async fn reload_thread(&self, thread_id: &ThreadId) -> Result<Thread, EngineError> {
        self.storage
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| EngineError::not_found("thread", thread_id))
    }

    pub(crate) async fn load_current(
        &self,
        thread_id: &ThreadId,
    ) -> Result<(Thread, State), EngineError> {
        let thread = self.reload_thread(thread_id).await?;
        let state = self
            .storage
            .get_state(&thread.current_state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", &thread.current_state_id))?;
        Ok((thread, state))
    }

    /// Queued-event count (introspection).
    pub async fn queued_event_count(&self, thread_id: &ThreadId) -> Result<usize, EngineError> {
        Ok(self.storage.event_queue_len(thread_id).await?)
    }

    /// Head of the queue without consuming it (introspection).
    pub async fn peek_next_event(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<QueuedEvent>, EngineError> {
        Ok(self.storage.peek_event(thread_id).await?)
    }

    /// Whether the most recent step for the thread failed (introspection).
    pub async fn last_step_status(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<StepStatus>, EngineError> {
        let steps = self.storage.get_steps_by_thread(thread_id).await?;
        Ok(steps.last().map(|s| s.status.clone()))
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
