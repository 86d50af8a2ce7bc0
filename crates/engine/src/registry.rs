// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reducer trait and registry.
//!
//! A reducer is a pure function from `(state, event)` to operations plus new
//! chunks. No I/O, no clock reads: the only time a reducer may observe is
//! `event.timestamp_ms`. The registry fans an event out to every accepting
//! reducer in registration order and concatenates their outputs.

use crate::error::ReducerError;
use crate::reducers::{ConversationReducer, LifecycleReducer, MemoryControlReducer};
use engram_core::{Chunk, Event, Operation, State};
use std::sync::Arc;

/// Operations plus the chunk values they reference.
#[derive(Debug, Clone, Default)]
pub struct ReducerOutput {
    pub operations: Vec<Operation>,
    pub chunks: Vec<Chunk>,
}

impl ReducerOutput {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn merge(&mut self, other: ReducerOutput) {
        self.operations.extend(other.operations);
        self.chunks.extend(other.chunks);
    }
}

/// A pure event handler.
pub trait Reducer: Send + Sync {
    /// Name used in logs, observer notifications, and chunk provenance.
    fn name(&self) -> &'static str;

    /// Whether this reducer handles the event kind.
    fn accepts(&self, event: &Event) -> bool;

    /// Map the event to operations and chunks. Must be pure.
    fn reduce(&self, state: &State, event: &Event) -> Result<ReducerOutput, ReducerError>;
}

/// Ordered collection of reducers.
pub struct ReducerRegistry {
    reducers: Vec<Arc<dyn Reducer>>,
}

impl ReducerRegistry {
    pub fn new() -> Self {
        Self {
            reducers: Vec::new(),
        }
    }

    /// The built-in reducer set: conversation, lifecycle, memory control.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConversationReducer));
        registry.register(Arc::new(LifecycleReducer));
        registry.register(Arc::new(MemoryControlReducer));
        registry
    }

    /// Append a reducer; ties between reducers accepting the same event are
    /// broken by registration order.
    pub fn register(&mut self, reducer: Arc<dyn Reducer>) {
        self.reducers.push(reducer);
    }

    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }

    /// Reducers accepting the event, in registration order.
    pub fn accepting(&self, event: &Event) -> Vec<Arc<dyn Reducer>> {
        self.reducers
            .iter()
            .filter(|r| r.accepts(event))
            .cloned()
            .collect()
    }

    /// Run every accepting reducer and concatenate outputs.
    ///
    /// An event no reducer accepts yields an empty output (no-op).
    pub fn reduce(&self, state: &State, event: &Event) -> Result<ReducerOutput, ReducerError> {
        let mut merged = ReducerOutput::default();
        for reducer in self.accepting(event) {
            merged.merge(reducer.reduce(state, event)?);
        }
        Ok(merged)
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
