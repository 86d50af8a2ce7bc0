// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in compactor: summarizes working-history windows via the model.

use super::{CompactionContext, Compactor};
use crate::error::CompactorError;
use async_trait::async_trait;
use engram_adapters::{CompletionRequest, ModelClient, ModelError};
use engram_core::{Chunk, ChunkContent, ChunkId, ChunkKind, Retention};
use std::sync::Arc;

const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Summarizes compressible working-history chunks into one compacted chunk.
pub struct HistoryCompactor {
    model: Arc<dyn ModelClient>,
    max_summary_tokens: Option<u32>,
}

impl HistoryCompactor {
    pub const NAME: &'static str = "history";

    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            max_summary_tokens: None,
        }
    }

    pub fn with_max_summary_tokens(mut self, max_tokens: u32) -> Self {
        self.max_summary_tokens = Some(max_tokens);
        self
    }

    fn render_entries(ctx: &CompactionContext<'_>) -> String {
        let mut lines = Vec::new();
        for chunk in ctx.window {
            if chunk.kind.is_container() {
                for child in ctx.state.children_of(chunk) {
                    lines.push(format!("- [{}] {}", child.kind, child.rendered()));
                }
            } else {
                lines.push(format!("- [{}] {}", chunk.kind, chunk.rendered()));
            }
        }
        lines.join("\n")
    }

    fn build_prompt(ctx: &CompactionContext<'_>) -> String {
        let goal = ctx.task_goal.as_deref().unwrap_or("(unknown)");
        let progress = ctx.progress.as_deref().unwrap_or("(none)");
        format!(
            "You are compacting an agent's working memory. Summarize the \
entries below into a single dense paragraph that preserves every fact, \
decision, open question, and tool outcome needed to continue the task. \
The summary must be significantly shorter than the entries.\n\
<context>\ntask goal: {goal}\nprogress so far: {progress}\n</context>\n\
<entries>\n{entries}\n</entries>",
            entries = Self::render_entries(ctx),
        )
    }
}

#[async_trait]
impl Compactor for HistoryCompactor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn can_compact(&self, chunks: &[Chunk]) -> bool {
        !chunks.is_empty()
            && chunks.iter().all(|c| {
                c.retention != Retention::Critical
                    && matches!(
                        c.kind,
                        ChunkKind::WorkingHistory | ChunkKind::Workflow | ChunkKind::Compacted
                    )
            })
    }

    async fn compact(&self, ctx: &CompactionContext<'_>) -> Result<Chunk, CompactorError> {
        let mut request = CompletionRequest::from_prompt(Self::build_prompt(ctx));
        request.temperature = Some(SUMMARY_TEMPERATURE);
        request.max_tokens = self.max_summary_tokens;

        let response = self.model.complete(request).await?;
        if response.content.trim().is_empty() {
            return Err(ModelError::EmptyCompletion.into());
        }

        let parent_ids: Vec<ChunkId> = ctx.window.iter().map(|c| c.id.clone()).collect();
        Ok(
            Chunk::builder(ChunkKind::Compacted, ChunkContent::text(response.content))
                .retention(Retention::Compressible)
                .parents(parent_ids)
                .created_at_ms(ctx.now_ms)
                .source_operation("compaction")
                .custom("compactor", serde_json::json!(Self::NAME))
                .build(),
        )
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
