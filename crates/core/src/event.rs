// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types driving the agent memory runtime.
//!
//! An [`Event`] is an envelope (timestamp, dispatch strategy, response
//! requirement) around a tagged payload. Payloads serialize with
//! `{"type": "ns:verb", ...fields}` and unknown type tags deserialize to
//! `Custom`, so newer writers don't break older readers.

use crate::chunk::ChunkId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Identifier stamped on a queued event when it enters a thread's queue.
    pub struct EventId("evt_");
}

/// How an event interacts with the thread's queue and drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStrategy {
    /// Normal FIFO processing.
    Queue,
    /// Processing should signal cancellation of outstanding model work.
    Interrupt,
    /// The drain loop stops after this event.
    Terminate,
    /// Processed without observer notification of the dispatch itself.
    Silent,
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStrategy::Queue => write!(f, "queue"),
            DispatchStrategy::Interrupt => write!(f, "interrupt"),
            DispatchStrategy::Terminate => write!(f, "terminate"),
            DispatchStrategy::Silent => write!(f, "silent"),
        }
    }
}

/// Effect of an event on the successor state's `need_llm_continue_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmResponseRequirement {
    /// Preserve the prior state's value.
    Keep,
    /// The next tick requires a model response.
    Set,
    /// No model response is pending.
    Clear,
}

/// Payload variants.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
/// Unknown type tags deserialize to `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    // -- conversation --
    #[serde(rename = "user:message")]
    UserMessage { content: String },

    #[serde(rename = "llm:text_response")]
    LlmTextResponse { content: String },

    #[serde(rename = "llm:thinking")]
    Thinking { content: String },

    #[serde(rename = "llm:tool_call")]
    LlmToolCall {
        tool_name: String,
        call_id: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },

    #[serde(rename = "tool:result")]
    ToolResult {
        call_id: String,
        success: bool,
        #[serde(default)]
        result: serde_json::Value,
    },

    // -- sub-agents --
    #[serde(rename = "subagent:spawned")]
    SubagentSpawned {
        agent_name: String,
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child_thread_id: Option<String>,
    },

    #[serde(rename = "subagent:result")]
    SubagentResult {
        agent_name: String,
        result: String,
        #[serde(default)]
        success: bool,
    },

    #[serde(rename = "parent:message")]
    ParentMessage { content: String },

    // -- lifecycle --
    #[serde(rename = "task:completed")]
    TaskCompleted { result: String },

    #[serde(rename = "task:abandoned")]
    TaskAbandoned { reason: String },

    #[serde(rename = "task:terminated")]
    TaskTerminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // -- memory control --
    #[serde(rename = "memory:mark_critical")]
    MemoryMarkCritical { chunk_id: ChunkId },

    #[serde(rename = "memory:forget")]
    MemoryForget { chunk_id: ChunkId },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl EventPayload {
    /// Stable name for logging and step records (the serde tag).
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::UserMessage { .. } => "user:message",
            EventPayload::LlmTextResponse { .. } => "llm:text_response",
            EventPayload::Thinking { .. } => "llm:thinking",
            EventPayload::LlmToolCall { .. } => "llm:tool_call",
            EventPayload::ToolResult { .. } => "tool:result",
            EventPayload::SubagentSpawned { .. } => "subagent:spawned",
            EventPayload::SubagentResult { .. } => "subagent:result",
            EventPayload::ParentMessage { .. } => "parent:message",
            EventPayload::TaskCompleted { .. } => "task:completed",
            EventPayload::TaskAbandoned { .. } => "task:abandoned",
            EventPayload::TaskTerminated { .. } => "task:terminated",
            EventPayload::MemoryMarkCritical { .. } => "memory:mark_critical",
            EventPayload::MemoryForget { .. } => "memory:forget",
            EventPayload::Custom => "custom",
        }
    }

    /// Lifecycle events end the thread's run.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventPayload::TaskCompleted { .. }
                | EventPayload::TaskAbandoned { .. }
                | EventPayload::TaskTerminated { .. }
        )
    }
}

/// An event envelope: payload plus dispatch metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: EventPayload,

    #[serde(default)]
    pub timestamp_ms: u64,

    /// Explicit strategy override; the payload kind supplies the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_strategy: Option<DispatchStrategy>,

    /// Explicit requirement override; the payload kind supplies the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response_requirement: Option<LlmResponseRequirement>,
}

impl Event {
    pub fn new(payload: EventPayload, timestamp_ms: u64) -> Self {
        Self {
            payload,
            timestamp_ms,
            dispatch_strategy: None,
            llm_response_requirement: None,
        }
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.dispatch_strategy = Some(strategy);
        self
    }

    pub fn with_requirement(mut self, requirement: LlmResponseRequirement) -> Self {
        self.llm_response_requirement = Some(requirement);
        self
    }

    /// Stable name for logging and step records.
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// The strategy in force: explicit override, else kind default.
    pub fn effective_strategy(&self) -> DispatchStrategy {
        self.dispatch_strategy.unwrap_or_else(|| {
            if self.payload.is_lifecycle() {
                DispatchStrategy::Terminate
            } else {
                DispatchStrategy::Queue
            }
        })
    }

    /// The response requirement in force: explicit override, else kind default.
    ///
    /// Inbound conversation (user, tool results, parent, sub-agent results)
    /// marks a model response as pending; model output and lifecycle events
    /// clear it; everything else keeps the prior value.
    pub fn effective_requirement(&self) -> LlmResponseRequirement {
        if let Some(requirement) = self.llm_response_requirement {
            return requirement;
        }
        match &self.payload {
            EventPayload::UserMessage { .. }
            | EventPayload::ToolResult { .. }
            | EventPayload::ParentMessage { .. }
            | EventPayload::SubagentResult { .. } => LlmResponseRequirement::Set,
            EventPayload::LlmTextResponse { .. } => LlmResponseRequirement::Clear,
            payload if payload.is_lifecycle() => LlmResponseRequirement::Clear,
            _ => LlmResponseRequirement::Keep,
        }
    }

    /// One-line summary for log spans.
    pub fn log_summary(&self) -> String {
        match &self.payload {
            EventPayload::UserMessage { content } => {
                format!("user:message len={}", content.len())
            }
            EventPayload::LlmToolCall {
                tool_name, call_id, ..
            } => format!("llm:tool_call tool={tool_name} call={call_id}"),
            EventPayload::ToolResult {
                call_id, success, ..
            } => format!("tool:result call={call_id} ok={success}"),
            EventPayload::SubagentSpawned { agent_name, .. } => {
                format!("subagent:spawned agent={agent_name}")
            }
            other => other.kind().to_string(),
        }
    }
}

/// A queue entry: the event plus its queue identity and enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub event_id: EventId,
    pub enqueued_at_ms: u64,
    pub event: Event,
}

impl QueuedEvent {
    pub fn new(event: Event, enqueued_at_ms: u64) -> Self {
        Self {
            event_id: EventId::new(),
            enqueued_at_ms,
            event,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
