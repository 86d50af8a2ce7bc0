// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threads: long-lived identities owning a state history and event queue.

use crate::event::QueuedEvent;
use crate::state::StateId;
use crate::step::StepId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a thread.
    pub struct ThreadId("thread_");
}

/// Thread bookkeeping: timestamps and free-form tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// A conversation or agent run.
///
/// The thread record is the unit of persistence for the pending event queue;
/// states and chunks are stored separately and referenced by id. Threads are
/// updated monotonically: states append, `current_state_id` moves forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub current_state_id: StateId,
    pub initial_state_id: StateId,
    #[serde(default)]
    pub metadata: ThreadMetadata,

    /// Pending events, FIFO. Persisted with the thread.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_queue: Vec<QueuedEvent>,

    /// Step lock holder: set while an event is being processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<StepId>,

    /// External hint that the agent loop owes a response.
    #[serde(default)]
    pub needs_response: bool,

    // Runtime metadata preserved through updates; not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_thread_ids: Vec<ThreadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<ThreadId>,
}

impl Thread {
    /// Create a thread rooted at the given initial state.
    pub fn new(id: ThreadId, initial_state_id: StateId, created_at_ms: u64) -> Self {
        Self {
            id,
            current_state_id: initial_state_id.clone(),
            initial_state_id,
            metadata: ThreadMetadata {
                created_at_ms,
                updated_at_ms: created_at_ms,
                custom: serde_json::Map::new(),
            },
            event_queue: Vec::new(),
            current_step_id: None,
            needs_response: false,
            blueprint_id: None,
            blueprint_name: None,
            llm_config: None,
            tools: Vec::new(),
            sub_agents: Vec::new(),
            child_thread_ids: Vec::new(),
            parent_thread_id: None,
        }
    }

    /// Advance the head to a newly appended state.
    pub fn advance_to(&mut self, state_id: StateId, updated_at_ms: u64) {
        self.current_state_id = state_id;
        self.metadata.updated_at_ms = updated_at_ms;
    }

    /// Whether a step lock is currently held.
    pub fn step_in_progress(&self) -> bool {
        self.current_step_id.is_some()
    }
}

#[cfg(test)]
#[path = "thread_tests.rs"]
mod tests;
