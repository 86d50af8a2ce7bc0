// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread execution mode and pending background-operation slots.
//!
//! Owned by the orchestrator; no I/O. Pending slots are recorded by the
//! event processor and consumed (read-and-clear) by whichever loop executes
//! the operation.

use engram_core::{Chunk, ChunkId, ThreadId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// Whether events drain immediately or wait for explicit steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Auto,
    Stepping,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Auto => write!(f, "auto"),
            ExecutionMode::Stepping => write!(f, "stepping"),
        }
    }
}

#[derive(Default)]
struct ThreadControl {
    mode: ExecutionMode,
    pending_compaction: Option<Vec<Chunk>>,
    pending_truncation: Option<Vec<ChunkId>>,
}

/// Mode flags and pending-operation slots, keyed by thread.
#[derive(Default)]
pub struct ExecutionModeController {
    threads: Mutex<HashMap<ThreadId, ThreadControl>>,
}

impl ExecutionModeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode; unknown threads are `Auto`.
    pub fn mode(&self, thread_id: &ThreadId) -> ExecutionMode {
        self.threads
            .lock()
            .get(thread_id)
            .map(|c| c.mode)
            .unwrap_or_default()
    }

    pub fn set_mode(&self, thread_id: &ThreadId, mode: ExecutionMode) {
        self.threads.lock().entry(thread_id.clone()).or_default().mode = mode;
    }

    pub fn set_pending_compaction(&self, thread_id: &ThreadId, chunks: Vec<Chunk>) {
        self.threads
            .lock()
            .entry(thread_id.clone())
            .or_default()
            .pending_compaction = Some(chunks);
    }

    /// Read-and-clear the pending compaction window.
    pub fn take_pending_compaction(&self, thread_id: &ThreadId) -> Option<Vec<Chunk>> {
        self.threads
            .lock()
            .get_mut(thread_id)
            .and_then(|c| c.pending_compaction.take())
    }

    pub fn has_pending_compaction(&self, thread_id: &ThreadId) -> bool {
        self.threads
            .lock()
            .get(thread_id)
            .is_some_and(|c| c.pending_compaction.is_some())
    }

    pub fn set_pending_truncation(&self, thread_id: &ThreadId, chunk_ids: Vec<ChunkId>) {
        self.threads
            .lock()
            .entry(thread_id.clone())
            .or_default()
            .pending_truncation = Some(chunk_ids);
    }

    /// Read-and-clear the pending truncation set.
    pub fn take_pending_truncation(&self, thread_id: &ThreadId) -> Option<Vec<ChunkId>> {
        self.threads
            .lock()
            .get_mut(thread_id)
            .and_then(|c| c.pending_truncation.take())
    }

    pub fn has_pending_truncation(&self, thread_id: &ThreadId) -> bool {
        self.threads
            .lock()
            .get(thread_id)
            .is_some_and(|c| c.pending_truncation.is_some())
    }

    /// Cleanup on thread delete.
    pub fn remove_thread(&self, thread_id: &ThreadId) {
        self.threads.lock().remove(thread_id);
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
