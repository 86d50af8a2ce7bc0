// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunks: the atomic units of agent memory.
//!
//! A chunk is created once and never mutated. "Editing" a chunk means
//! deriving a successor whose `parent_ids` names the original, then swapping
//! it in through an `Update` or `BatchReplace` operation.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a chunk.
    ///
    /// Top-level chunks use the `chunk_` prefix; chunks that live only as
    /// children of a container (working-history leaves) use `child_`.
    pub struct ChunkId("chunk_");
}

impl ChunkId {
    /// Prefix for chunks that exist only as container children.
    pub const CHILD_PREFIX: &'static str = "child_";

    /// Generate a new random ID with the child prefix.
    pub fn new_child() -> Self {
        Self(format!(
            "{}{}",
            Self::CHILD_PREFIX,
            nanoid::nanoid!({ crate::id::ID_SUFFIX_LEN })
        ))
    }

    /// Whether this ID was generated with the child prefix.
    pub fn is_child(&self) -> bool {
        self.0.starts_with(Self::CHILD_PREFIX)
    }
}

/// Closed enumeration of chunk kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    System,
    Agent,
    Workflow,
    Delegation,
    Environment,
    /// Container holding the ordered conversation leaves via `child_ids`.
    WorkingHistory,
    Output,
    UserMessage,
    AgentResponse,
    AgentAction,
    ActionResponse,
    Thinking,
    SubagentSpawn,
    SubagentResult,
    ParentMessage,
    /// Summary chunk produced by compaction.
    Compacted,
}

impl ChunkKind {
    /// Retention applied when the constructor does not override it.
    pub fn default_retention(self) -> Retention {
        match self {
            ChunkKind::System
            | ChunkKind::Agent
            | ChunkKind::Workflow
            | ChunkKind::Delegation
            | ChunkKind::Output => Retention::Critical,
            ChunkKind::Environment => Retention::Compressible,
            ChunkKind::WorkingHistory | ChunkKind::Compacted => Retention::Compressible,
            ChunkKind::Thinking => Retention::Disposable,
            ChunkKind::UserMessage
            | ChunkKind::AgentResponse
            | ChunkKind::AgentAction
            | ChunkKind::ActionResponse
            | ChunkKind::SubagentSpawn
            | ChunkKind::SubagentResult
            | ChunkKind::ParentMessage => Retention::BatchCompressible,
        }
    }

    /// Ordering hint applied when the constructor does not override it.
    pub fn default_priority(self) -> i32 {
        match self {
            ChunkKind::System => 100,
            ChunkKind::Agent => 90,
            ChunkKind::Workflow | ChunkKind::Delegation => 80,
            ChunkKind::Output => 70,
            ChunkKind::Environment => 60,
            ChunkKind::WorkingHistory | ChunkKind::Compacted => 50,
            _ => 10,
        }
    }

    /// Whether chunks of this kind may be superseded by default.
    pub fn default_mutable(self) -> bool {
        matches!(self, ChunkKind::WorkingHistory | ChunkKind::Environment)
    }

    /// Conversation leaves live inside a working-history container.
    pub fn is_conversation_leaf(self) -> bool {
        matches!(
            self,
            ChunkKind::UserMessage
                | ChunkKind::AgentResponse
                | ChunkKind::AgentAction
                | ChunkKind::ActionResponse
                | ChunkKind::Thinking
                | ChunkKind::SubagentSpawn
                | ChunkKind::SubagentResult
                | ChunkKind::ParentMessage
        )
    }

    /// Container kinds carry `child_ids`.
    pub fn is_container(self) -> bool {
        matches!(self, ChunkKind::WorkingHistory)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkKind::System => "system",
            ChunkKind::Agent => "agent",
            ChunkKind::Workflow => "workflow",
            ChunkKind::Delegation => "delegation",
            ChunkKind::Environment => "environment",
            ChunkKind::WorkingHistory => "working_history",
            ChunkKind::Output => "output",
            ChunkKind::UserMessage => "user_message",
            ChunkKind::AgentResponse => "agent_response",
            ChunkKind::AgentAction => "agent_action",
            ChunkKind::ActionResponse => "action_response",
            ChunkKind::Thinking => "thinking",
            ChunkKind::SubagentSpawn => "subagent_spawn",
            ChunkKind::SubagentResult => "subagent_result",
            ChunkKind::ParentMessage => "parent_message",
            ChunkKind::Compacted => "compacted",
        };
        write!(f, "{name}")
    }
}

/// How a chunk behaves under token pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Never compacted or truncated.
    Critical,
    /// Summarizable on its own.
    Compressible,
    /// Summarizable together with sibling chunks.
    BatchCompressible,
    /// May be dropped outright.
    Disposable,
}

impl Retention {
    /// Whether chunks with this retention participate in compaction and
    /// truncation.
    pub fn is_compactable(self) -> bool {
        !matches!(self, Retention::Critical)
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retention::Critical => write!(f, "critical"),
            Retention::Compressible => write!(f, "compressible"),
            Retention::BatchCompressible => write!(f, "batch_compressible"),
            Retention::Disposable => write!(f, "disposable"),
        }
    }
}

/// Tagged content variants.
///
/// Serializes with `{"type": "text", ...}` discriminators so snapshot files
/// round-trip without ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChunkContent {
    Text {
        text: String,
    },
    Structured {
        fields: serde_json::Map<String, serde_json::Value>,
    },
    Mixed {
        parts: Vec<ChunkContent>,
    },
}

impl ChunkContent {
    pub fn text(text: impl Into<String>) -> Self {
        ChunkContent::Text { text: text.into() }
    }

    pub fn structured(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        ChunkContent::Structured { fields }
    }

    /// Flatten to plain text for token counting and prompt rendering.
    pub fn rendered(&self) -> String {
        match self {
            ChunkContent::Text { text } => text.clone(),
            ChunkContent::Structured { fields } => {
                serde_json::to_string(fields).unwrap_or_default()
            }
            ChunkContent::Mixed { parts } => {
                let rendered: Vec<String> = parts.iter().map(|p| p.rendered()).collect();
                rendered.join("\n")
            }
        }
    }

    /// The inner text when this is a plain text variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChunkContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Chunk bookkeeping: creation time, originating operation, free-form tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub created_at_ms: u64,
    /// Name of the operation or reducer that produced this chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_operation: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// A single immutable memory element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub kind: ChunkKind,
    pub content: ChunkContent,
    pub retention: Retention,
    pub mutable: bool,
    pub priority: i32,
    /// Lineage: chunks this one was derived from (edits, compactions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_ids: Vec<ChunkId>,
    /// Ordered children of a container chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<ChunkId>>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Start building a chunk with kind-driven defaults.
    pub fn builder(kind: ChunkKind, content: ChunkContent) -> ChunkBuilder {
        ChunkBuilder {
            id: None,
            kind,
            content,
            retention: None,
            mutable: None,
            priority: None,
            parent_ids: Vec::new(),
            child_ids: None,
            created_at_ms: 0,
            source_operation: None,
            custom: serde_json::Map::new(),
        }
    }

    /// Derive a successor: same kind and attributes, fresh ID (preserving the
    /// child/top-level prefix class), `parent_ids = [self.id]`.
    pub fn derive(&self) -> ChunkBuilder {
        let id = if self.id.is_child() {
            ChunkId::new_child()
        } else {
            ChunkId::new()
        };
        ChunkBuilder {
            id: Some(id),
            kind: self.kind,
            content: self.content.clone(),
            retention: Some(self.retention),
            mutable: Some(self.mutable),
            priority: Some(self.priority),
            parent_ids: vec![self.id.clone()],
            child_ids: self.child_ids.clone(),
            created_at_ms: self.metadata.created_at_ms,
            source_operation: self.metadata.source_operation.clone(),
            custom: self.metadata.custom.clone(),
        }
    }

    /// Whether this chunk participates in compaction and truncation.
    pub fn is_compactable(&self) -> bool {
        self.retention.is_compactable()
    }

    /// Rendered content for token counting.
    pub fn rendered(&self) -> String {
        self.content.rendered()
    }
}

/// Builder for [`Chunk`]: copy fields, adjust, seal.
pub struct ChunkBuilder {
    id: Option<ChunkId>,
    kind: ChunkKind,
    content: ChunkContent,
    retention: Option<Retention>,
    mutable: Option<bool>,
    priority: Option<i32>,
    parent_ids: Vec<ChunkId>,
    child_ids: Option<Vec<ChunkId>>,
    created_at_ms: u64,
    source_operation: Option<String>,
    custom: serde_json::Map<String, serde_json::Value>,
}

impl ChunkBuilder {
    /// Use the `child_` ID prefix (conversation leaves inside a container).
    pub fn as_child(mut self) -> Self {
        self.id = Some(ChunkId::new_child());
        self
    }

    pub fn id(mut self, id: ChunkId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn content(mut self, content: ChunkContent) -> Self {
        self.content = content;
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn mutable(mut self, mutable: bool) -> Self {
        self.mutable = Some(mutable);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn parents(mut self, parent_ids: Vec<ChunkId>) -> Self {
        self.parent_ids = parent_ids;
        self
    }

    pub fn children(mut self, child_ids: Vec<ChunkId>) -> Self {
        self.child_ids = Some(child_ids);
        self
    }

    pub fn push_child(mut self, child_id: ChunkId) -> Self {
        self.child_ids.get_or_insert_with(Vec::new).push(child_id);
        self
    }

    pub fn created_at_ms(mut self, ms: u64) -> Self {
        self.created_at_ms = ms;
        self
    }

    pub fn source_operation(mut self, op: impl Into<String>) -> Self {
        self.source_operation = Some(op.into());
        self
    }

    pub fn custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Seal the chunk. Unset attributes fall back to kind-driven defaults.
    pub fn build(self) -> Chunk {
        let retention = self.retention.unwrap_or_else(|| self.kind.default_retention());
        let mutable = self.mutable.unwrap_or_else(|| self.kind.default_mutable());
        let priority = self.priority.unwrap_or_else(|| self.kind.default_priority());
        Chunk {
            id: self.id.unwrap_or_default(),
            kind: self.kind,
            content: self.content,
            retention,
            mutable,
            priority,
            parent_ids: self.parent_ids,
            child_ids: self.child_ids,
            metadata: ChunkMetadata {
                created_at_ms: self.created_at_ms,
                source_operation: self.source_operation,
                custom: self.custom,
            },
        }
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod tests;
