// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer fan-out for runtime lifecycle notifications.
//!
//! Fan-out is synchronous and best-effort: a hook returning `Err` is
//! reported through the error path and never aborts event processing.

use engram_core::{Event, QueuedEvent, StateId, ThreadId};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Error surfaced by an observer hook. Captured, never propagated.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Details of a state change notification.
pub struct StateChange<'a> {
    pub thread_id: &'a ThreadId,
    pub previous_state_id: &'a StateId,
    pub new_state_id: &'a StateId,
    /// `None` for synthetic transitions (truncation).
    pub trigger: Option<&'a Event>,
    /// Reducer or operation name ("conversation", "Truncation", …).
    pub source: &'a str,
}

/// Lifecycle hooks. Every hook defaults to a no-op.
#[allow(unused_variables)]
pub trait Observer: Send + Sync {
    /// Name used when reporting this observer's failures.
    fn name(&self) -> &'static str;

    fn on_event_dispatched(
        &self,
        thread_id: &ThreadId,
        event: &Event,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_event_queued(
        &self,
        thread_id: &ThreadId,
        entry: &QueuedEvent,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_event_dequeued(
        &self,
        thread_id: &ThreadId,
        entry: &QueuedEvent,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_reducer_executed(
        &self,
        thread_id: &ThreadId,
        reducer: &str,
        duration: Duration,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_state_changed(&self, change: &StateChange<'_>) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_compaction_started(
        &self,
        thread_id: &ThreadId,
        chunk_count: usize,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_compaction_completed(
        &self,
        thread_id: &ThreadId,
        tokens_before: usize,
        tokens_after: usize,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_subagent_spawned(
        &self,
        thread_id: &ThreadId,
        parent_state_id: &StateId,
        agent_name: &str,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_subagent_result(
        &self,
        thread_id: &ThreadId,
        agent_name: &str,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Error channel. Infallible so reporting can't recurse.
    fn on_error(&self, thread_id: Option<&ThreadId>, error: &str) {}
}

/// Synchronous observer fan-out.
#[derive(Default)]
pub struct ObserverManager {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

// Failures are collected first so the error fan-out never runs while the
// observer list lock is held.
macro_rules! notify {
    ($manager:expr, $thread_id:expr, $hook:ident ( $($arg:expr),* )) => {
        let mut failures: Vec<(&'static str, ObserverError)> = Vec::new();
        {
            let observers = $manager.observers.read();
            for observer in observers.iter() {
                if let Err(e) = observer.$hook($($arg),*) {
                    failures.push((observer.name(), e));
                }
            }
        }
        for (name, error) in failures {
            $manager.report_failure(name, $thread_id, &error);
        }
    };
}

impl ObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    fn report_failure(&self, observer: &str, thread_id: Option<&ThreadId>, error: &ObserverError) {
        warn!(observer, error = %error, "observer hook failed");
        let message = format!("observer {observer} failed: {error}");
        for other in self.observers.read().iter() {
            other.on_error(thread_id, &message);
        }
    }

    pub fn event_dispatched(&self, thread_id: &ThreadId, event: &Event) {
        notify!(self, Some(thread_id), on_event_dispatched(thread_id, event));
    }

    pub fn event_queued(&self, thread_id: &ThreadId, entry: &QueuedEvent) {
        notify!(self, Some(thread_id), on_event_queued(thread_id, entry));
    }

    pub fn event_dequeued(&self, thread_id: &ThreadId, entry: &QueuedEvent) {
        notify!(self, Some(thread_id), on_event_dequeued(thread_id, entry));
    }

    pub fn reducer_executed(&self, thread_id: &ThreadId, reducer: &str, duration: Duration) {
        notify!(
            self,
            Some(thread_id),
            on_reducer_executed(thread_id, reducer, duration)
        );
    }

    pub fn state_changed(&self, change: &StateChange<'_>) {
        notify!(self, Some(change.thread_id), on_state_changed(change));
    }

    pub fn compaction_started(&self, thread_id: &ThreadId, chunk_count: usize) {
        notify!(
            self,
            Some(thread_id),
            on_compaction_started(thread_id, chunk_count)
        );
    }

    pub fn compaction_completed(
        &self,
        thread_id: &ThreadId,
        tokens_before: usize,
        tokens_after: usize,
    ) {
        notify!(
            self,
            Some(thread_id),
            on_compaction_completed(thread_id, tokens_before, tokens_after)
        );
    }

    pub fn subagent_spawned(
        &self,
        thread_id: &ThreadId,
        parent_state_id: &StateId,
        agent_name: &str,
    ) {
        notify!(
            self,
            Some(thread_id),
            on_subagent_spawned(thread_id, parent_state_id, agent_name)
        );
    }

    pub fn subagent_result(&self, thread_id: &ThreadId, agent_name: &str) {
        notify!(
            self,
            Some(thread_id),
            on_subagent_result(thread_id, agent_name)
        );
    }

    pub fn error(&self, thread_id: Option<&ThreadId>, error: &str) {
        for observer in self.observers.read().iter() {
            observer.on_error(thread_id, error);
        }
    }
}

/// Observer that mirrors notifications into structured log lines.
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn on_event_dispatched(
        &self,
        thread_id: &ThreadId,
        event: &Event,
    ) -> Result<(), ObserverError> {
        tracing::info!(thread_id = %thread_id, event = %event.log_summary(), "event dispatched");
        Ok(())
    }

    fn on_reducer_executed(
        &self,
        thread_id: &ThreadId,
        reducer: &str,
        duration: Duration,
    ) -> Result<(), ObserverError> {
        tracing::debug!(
            thread_id = %thread_id,
            reducer,
            elapsed_ms = duration.as_millis() as u64,
            "reducer executed"
        );
        Ok(())
    }

    fn on_state_changed(&self, change: &StateChange<'_>) -> Result<(), ObserverError> {
        tracing::info!(
            thread_id = %change.thread_id,
            from = %change.previous_state_id,
            to = %change.new_state_id,
            source = change.source,
            "state changed"
        );
        Ok(())
    }

    fn on_compaction_completed(
        &self,
        thread_id: &ThreadId,
        tokens_before: usize,
        tokens_after: usize,
    ) -> Result<(), ObserverError> {
        tracing::info!(
            thread_id = %thread_id,
            tokens_before,
            tokens_after,
            "compaction completed"
        );
        Ok(())
    }

    fn on_error(&self, thread_id: Option<&ThreadId>, error: &str) {
        match thread_id {
            Some(id) => tracing::error!(thread_id = %id, error, "runtime error"),
            None => tracing::error!(error, "runtime error"),
        }
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
