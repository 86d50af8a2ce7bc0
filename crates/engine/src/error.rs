// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use engram_adapters::ModelError;
use engram_core::{StepId, ThreadId};
use engram_storage::StorageError;
use thiserror::Error;

/// Errors raised inside a reducer. Fatal to the step; state unchanged.
#[derive(Debug, Clone, Error)]
#[error("reducer {reducer} failed: {message}")]
pub struct ReducerError {
    pub reducer: &'static str,
    pub message: String,
}

impl ReducerError {
    pub fn new(reducer: &'static str, message: impl Into<String>) -> Self {
        Self {
            reducer,
            message: message.into(),
        }
    }
}

/// Errors from compactor selection or execution.
#[derive(Debug, Error)]
pub enum CompactorError {
    #[error("no compactor accepts the chunk set ({chunk_count} chunks)")]
    NoCompactor { chunk_count: usize },
    #[error("nothing to compact")]
    EmptyWindow,
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("step already in progress for {thread_id}: {step_id}")]
    StepInProgress {
        thread_id: ThreadId,
        step_id: StepId,
    },
    #[error(transparent)]
    Reducer(#[from] ReducerError),
    #[error(transparent)]
    Compactor(#[from] CompactorError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("execution mode error: {0}")]
    Mode(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        EngineError::Invariant(message.into())
    }
}
