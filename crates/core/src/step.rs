// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Steps: durable audit records of single-event processing.

use crate::state::StateId;
use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a step.
    pub struct StepId("step_");
}

/// Status of a processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// A step no longer holding the thread's lock legitimately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one event being processed end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub thread_id: ThreadId,
    /// Kind tag of the event that triggered this step.
    pub trigger_event: String,
    /// Serialized event envelope, kept for debugging.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub event_payload: serde_json::Value,
    pub status: StepStatus,
    pub previous_state_id: StateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state_id: Option<StateId>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Model call transcript when this step invoked the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_interaction: Option<serde_json::Value>,
}

impl Step {
    /// Start a running step for the given trigger.
    pub fn start(
        thread_id: ThreadId,
        trigger_event: impl Into<String>,
        event_payload: serde_json::Value,
        previous_state_id: StateId,
        started_at_ms: u64,
    ) -> Self {
        Self {
            id: StepId::new(),
            thread_id,
            trigger_event: trigger_event.into(),
            event_payload,
            status: StepStatus::Running,
            previous_state_id,
            result_state_id: None,
            started_at_ms,
            completed_at_ms: None,
            duration_ms: None,
            error: None,
            llm_interaction: None,
        }
    }

    /// Finalize as completed, pointing at the result state.
    pub fn complete(&mut self, result_state_id: StateId, completed_at_ms: u64) {
        self.status = StepStatus::Completed;
        self.result_state_id = Some(result_state_id);
        self.completed_at_ms = Some(completed_at_ms);
        self.duration_ms = Some(completed_at_ms.saturating_sub(self.started_at_ms));
    }

    /// Finalize as failed with the error text.
    pub fn fail(&mut self, error: impl Into<String>, completed_at_ms: u64) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at_ms = Some(completed_at_ms);
        self.duration_ms = Some(completed_at_ms.saturating_sub(self.started_at_ms));
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
