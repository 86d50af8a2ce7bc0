// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn builder_applies_kind_defaults() {
    let chunk = Chunk::builder(ChunkKind::System, ChunkContent::text("be helpful")).build();
    assert_eq!(chunk.retention, Retention::Critical);
    assert_eq!(chunk.priority, 100);
    assert!(!chunk.mutable);
    assert!(chunk.parent_ids.is_empty());
    assert!(chunk.child_ids.is_none());
}

#[test]
fn builder_explicit_values_override_defaults() {
    let chunk = Chunk::builder(ChunkKind::System, ChunkContent::text("x"))
        .retention(Retention::Disposable)
        .priority(1)
        .mutable(true)
        .build();
    assert_eq!(chunk.retention, Retention::Disposable);
    assert_eq!(chunk.priority, 1);
    assert!(chunk.mutable);
}

#[parameterized(
    system = { ChunkKind::System, Retention::Critical },
    output = { ChunkKind::Output, Retention::Critical },
    working_history = { ChunkKind::WorkingHistory, Retention::Compressible },
    compacted = { ChunkKind::Compacted, Retention::Compressible },
    thinking = { ChunkKind::Thinking, Retention::Disposable },
    user_message = { ChunkKind::UserMessage, Retention::BatchCompressible },
)]
fn kind_default_retention(kind: ChunkKind, expected: Retention) {
    assert_eq!(kind.default_retention(), expected);
}

#[test]
fn working_history_is_mutable_container() {
    assert!(ChunkKind::WorkingHistory.default_mutable());
    assert!(ChunkKind::WorkingHistory.is_container());
    assert!(!ChunkKind::UserMessage.is_container());
}

#[test]
fn conversation_leaves_are_classified() {
    assert!(ChunkKind::UserMessage.is_conversation_leaf());
    assert!(ChunkKind::ActionResponse.is_conversation_leaf());
    assert!(!ChunkKind::System.is_conversation_leaf());
    assert!(!ChunkKind::WorkingHistory.is_conversation_leaf());
}

#[test]
fn critical_is_not_compactable() {
    assert!(!Retention::Critical.is_compactable());
    assert!(Retention::Compressible.is_compactable());
    assert!(Retention::BatchCompressible.is_compactable());
    assert!(Retention::Disposable.is_compactable());
}

#[test]
fn child_id_prefix() {
    let id = ChunkId::new_child();
    assert!(id.as_str().starts_with("child_"));
    assert!(id.is_child());
    assert!(!ChunkId::new().is_child());
}

#[test]
fn derive_links_parent_and_keeps_prefix_class() {
    let original = Chunk::builder(ChunkKind::UserMessage, ChunkContent::text("hi"))
        .as_child()
        .created_at_ms(7)
        .build();
    let edited = original.derive().content(ChunkContent::text("hello")).build();

    assert_ne!(edited.id, original.id);
    assert!(edited.id.is_child());
    assert_eq!(edited.parent_ids, vec![original.id.clone()]);
    assert_eq!(edited.kind, original.kind);
    assert_eq!(edited.retention, original.retention);
    assert_eq!(edited.content.as_text(), Some("hello"));
    // The original is untouched
    assert_eq!(original.content.as_text(), Some("hi"));
}

#[test]
fn derive_container_keeps_children() {
    let leaf = ChunkId::new_child();
    let container = Chunk::builder(ChunkKind::WorkingHistory, ChunkContent::text(""))
        .children(vec![leaf.clone()])
        .build();
    let next_leaf = ChunkId::new_child();
    let grown = container.derive().push_child(next_leaf.clone()).build();

    assert_eq!(grown.child_ids, Some(vec![leaf, next_leaf]));
    assert_eq!(grown.parent_ids, vec![container.id]);
}

#[test]
fn content_rendered_flattens_variants() {
    let mut fields = serde_json::Map::new();
    fields.insert("tool".to_string(), serde_json::json!("read"));
    let mixed = ChunkContent::Mixed {
        parts: vec![
            ChunkContent::text("a"),
            ChunkContent::Structured { fields },
        ],
    };
    let rendered = mixed.rendered();
    assert!(rendered.starts_with("a\n"));
    assert!(rendered.contains("\"tool\""));
}

#[test]
fn content_serde_is_tagged() {
    let content = ChunkContent::text("hi");
    let json = serde_json::to_value(&content).unwrap();
    assert_eq!(json["type"], "text");
    assert_eq!(json["text"], "hi");

    let back: ChunkContent = serde_json::from_value(json).unwrap();
    assert_eq!(back, content);
}

#[test]
fn chunk_serde_roundtrip() {
    let chunk = Chunk::builder(ChunkKind::Compacted, ChunkContent::text("summary"))
        .parents(vec![ChunkId::from_string("chunk_a"), ChunkId::from_string("chunk_b")])
        .created_at_ms(123)
        .source_operation("compaction")
        .custom("window", serde_json::json!(2))
        .build();

    let json = serde_json::to_string(&chunk).unwrap();
    let back: Chunk = serde_json::from_str(&json).unwrap();
    assert_eq!(back, chunk);
}
