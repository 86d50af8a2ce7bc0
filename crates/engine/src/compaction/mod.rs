// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-budget inspection, compaction, and truncation.

mod history;

pub use history::HistoryCompactor;

use crate::error::{CompactorError, EngineError};
use crate::observer::{ObserverManager, StateChange};
use crate::registry::ReducerOutput;
use crate::steps;
use crate::transition::{self, TransitionContext, TransitionResult};
use async_trait::async_trait;
use engram_core::{
    Chunk, ChunkId, ChunkKind, LlmResponseRequirement, Operation, Provenance, ProvenanceSource,
    State, ThreadId, Tokenizer,
};
use engram_storage::Storage;
use std::sync::Arc;
use tracing::info;

/// Absolute token budgets. Invariant: `soft <= hard <= truncation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenThresholds {
    pub soft: usize,
    pub hard: usize,
    pub truncation: usize,
}

impl Default for TokenThresholds {
    fn default() -> Self {
        Self {
            soft: 16_000,
            hard: 32_000,
            truncation: 48_000,
        }
    }
}

/// Token accounting over a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub total: usize,
    pub critical: usize,
    pub compactable: usize,
}

/// Classification of a state against the thresholds.
#[derive(Debug, Clone)]
pub enum BudgetCheck {
    NoAction {
        usage: TokenUsage,
    },
    SoftWarning {
        usage: TokenUsage,
    },
    /// Above the hard threshold with something to compact.
    ForceCompaction {
        usage: TokenUsage,
        chunks: Vec<Chunk>,
    },
    /// Above the truncation threshold: drop the oldest compactable chunks
    /// until the total fits again.
    NeedsTruncation {
        usage: TokenUsage,
        chunk_ids: Vec<ChunkId>,
    },
}

impl BudgetCheck {
    pub fn usage(&self) -> TokenUsage {
        match self {
            BudgetCheck::NoAction { usage }
            | BudgetCheck::SoftWarning { usage }
            | BudgetCheck::ForceCompaction { usage, .. }
            | BudgetCheck::NeedsTruncation { usage, .. } => *usage,
        }
    }
}

/// Context handed to a compactor.
pub struct CompactionContext<'a> {
    pub state: &'a State,
    /// The top-level chunks being summarized.
    pub window: &'a [Chunk],
    /// Best-effort task goal, from system/delegation chunks.
    pub task_goal: Option<String>,
    /// Best-effort progress summary, from existing compacted chunks.
    pub progress: Option<String>,
    pub now_ms: u64,
}

/// A strategy that folds a chunk window into one summary chunk.
#[async_trait]
pub trait Compactor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this compactor can handle the window.
    fn can_compact(&self, chunks: &[Chunk]) -> bool;

    /// Produce the summary chunk. Its `parent_ids` must name the originals.
    async fn compact(&self, ctx: &CompactionContext<'_>) -> Result<Chunk, CompactorError>;
}

/// Inspects token usage and runs compaction/truncation transitions.
pub struct CompactionManager {
    storage: Arc<dyn Storage>,
    tokenizer: Arc<dyn Tokenizer>,
    compactors: Vec<Arc<dyn Compactor>>,
    thresholds: TokenThresholds,
    observers: Arc<ObserverManager>,
}

impl CompactionManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        tokenizer: Arc<dyn Tokenizer>,
        thresholds: TokenThresholds,
        observers: Arc<ObserverManager>,
    ) -> Self {
        Self {
            storage,
            tokenizer,
            compactors: Vec::new(),
            thresholds,
            observers,
        }
    }

    /// Append a compactor; `execute_compaction` picks the first that accepts.
    pub fn add_compactor(&mut self, compactor: Arc<dyn Compactor>) {
        self.compactors.push(compactor);
    }

    pub fn thresholds(&self) -> TokenThresholds {
        self.thresholds
    }

    /// Tokens of one top-level chunk, including container children.
    pub fn chunk_tokens(&self, state: &State, chunk: &Chunk) -> usize {
        let own = self.tokenizer.count_tokens(&chunk.rendered());
        let children: usize = state
            .children_of(chunk)
            .iter()
            .map(|child| self.tokenizer.count_tokens(&child.rendered()))
            .sum();
        own + children
    }

    /// Sum token usage over the state and classify against the thresholds.
    pub fn check_token_usage(&self, state: &State) -> BudgetCheck {
        let mut usage = TokenUsage::default();
        let mut sized: Vec<(&Chunk, usize)> = Vec::new();

        for chunk in state.top_level_chunks() {
            let tokens = self.chunk_tokens(state, chunk);
            usage.total += tokens;
            if chunk.is_compactable() {
                usage.compactable += tokens;
            } else {
                usage.critical += tokens;
            }
            sized.push((chunk, tokens));
        }

        let compactable: Vec<Chunk> = sized
            .iter()
            .filter(|(c, _)| c.is_compactable())
            .map(|(c, _)| (*c).clone())
            .collect();

        if usage.total >= self.thresholds.truncation && !compactable.is_empty() {
            // Oldest first: chunk_ids order is insertion order.
            let mut remaining = usage.total;
            let mut chunk_ids = Vec::new();
            for (chunk, tokens) in &sized {
                if !chunk.is_compactable() {
                    continue;
                }
                chunk_ids.push(chunk.id.clone());
                remaining = remaining.saturating_sub(*tokens);
                if remaining < self.thresholds.truncation {
                    break;
                }
            }
            return BudgetCheck::NeedsTruncation { usage, chunk_ids };
        }

        if usage.total >= self.thresholds.hard && !compactable.is_empty() {
            return BudgetCheck::ForceCompaction {
                usage,
                chunks: compactable,
            };
        }

        if usage.total >= self.thresholds.soft {
            return BudgetCheck::SoftWarning { usage };
        }

        BudgetCheck::NoAction { usage }
    }

    /// Summarize a chunk window into one chunk and batch-replace it in.
    pub async fn execute_compaction(
        &self,
        thread_id: &ThreadId,
        window: &[Chunk],
        now_ms: u64,
    ) -> Result<TransitionResult, EngineError> {
        if window.is_empty() {
            return Err(CompactorError::EmptyWindow.into());
        }
        let compactor = self
            .compactors
            .iter()
            .find(|c| c.can_compact(window))
            .ok_or(CompactorError::NoCompactor {
                chunk_count: window.len(),
            })?
            .clone();

        let mut thread = self
            .storage
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| EngineError::not_found("thread", thread_id))?;
        let state = self
            .storage
            .get_state(&thread.current_state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", &thread.current_state_id))?;

        let mut step = steps::begin_step(
            &self.storage,
            &mut thread,
            "compaction",
            serde_json::json!({ "compactor": compactor.name(), "window": window.len() }),
            now_ms,
        )
        .await?;

        self.observers.compaction_started(thread_id, window.len());

        let tokens_before: usize = window.iter().map(|c| self.chunk_tokens(&state, c)).sum();
        let ctx = CompactionContext {
            state: &state,
            window,
            task_goal: task_goal(&state),
            progress: progress_summary(&state),
            now_ms,
        };

        let summary = match compactor.compact(&ctx).await {
            Ok(summary) => summary,
            Err(e) => {
                steps::fail_step(&self.storage, &mut thread, &mut step, &e.to_string(), now_ms)
                    .await;
                return Err(e.into());
            }
        };
        let tokens_after = self.tokenizer.count_tokens(&summary.rendered());

        let window_ids: Vec<ChunkId> = window.iter().map(|c| c.id.clone()).collect();
        let output = ReducerOutput {
            operations: vec![Operation::batch_replace(
                window_ids.clone(),
                summary.id.clone(),
                now_ms,
            )],
            chunks: vec![summary],
        };
        let ctx = TransitionContext {
            provenance: Provenance::new(ProvenanceSource::Compaction, now_ms)
                .with_step(step.id.clone())
                .with_context(serde_json::json!({
                    "compactor": compactor.name(),
                    "tokens_before": tokens_before,
                    "tokens_after": tokens_after,
                })),
            source_operation: "compaction".to_string(),
            requirement: LlmResponseRequirement::Keep,
        };

        let result = match transition::apply(&state, &output, ctx) {
            Ok(result) => result,
            Err(e) => {
                steps::fail_step(&self.storage, &mut thread, &mut step, &e.to_string(), now_ms)
                    .await;
                return Err(e);
            }
        };

        steps::commit_step(
            &self.storage,
            &mut thread,
            &mut step,
            &result.state,
            &result.added_chunks,
            now_ms,
        )
        .await?;

        self.observers.state_changed(&StateChange {
            thread_id,
            previous_state_id: &state.id,
            new_state_id: &result.state.id,
            trigger: None,
            source: "compaction",
        });
        self.observers
            .compaction_completed(thread_id, tokens_before, tokens_after);
        info!(
            thread_id = %thread_id,
            tokens_before,
            tokens_after,
            replaced = window_ids.len(),
            "compaction applied"
        );

        Ok(result)
    }

    /// Delete the given chunks in one atomic transition.
    pub async fn execute_truncation(
        &self,
        thread_id: &ThreadId,
        chunk_ids: &[ChunkId],
        now_ms: u64,
    ) -> Result<TransitionResult, EngineError> {
        let mut thread = self
            .storage
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| EngineError::not_found("thread", thread_id))?;
        let state = self
            .storage
            .get_state(&thread.current_state_id)
            .await?
            .ok_or_else(|| EngineError::not_found("state", &thread.current_state_id))?;

        let mut step = steps::begin_step(
            &self.storage,
            &mut thread,
            "truncation",
            serde_json::json!({ "chunks": chunk_ids.len() }),
            now_ms,
        )
        .await?;

        let output = ReducerOutput {
            operations: chunk_ids
                .iter()
                .map(|id| Operation::delete(id.clone(), now_ms))
                .collect(),
            chunks: vec![],
        };
        let ctx = TransitionContext {
            provenance: Provenance::new(ProvenanceSource::Truncation, now_ms)
                .with_step(step.id.clone())
                .with_context(serde_json::json!({ "deleted": chunk_ids.len() })),
            source_operation: "truncation".to_string(),
            requirement: LlmResponseRequirement::Keep,
        };

        let result = match transition::apply(&state, &output, ctx) {
            Ok(result) => result,
            Err(e) => {
                steps::fail_step(&self.storage, &mut thread, &mut step, &e.to_string(), now_ms)
                    .await;
                return Err(e);
            }
        };

        steps::commit_step(
            &self.storage,
            &mut thread,
            &mut step,
            &result.state,
            &result.added_chunks,
            now_ms,
        )
        .await?;

        self.observers.state_changed(&StateChange {
            thread_id,
            previous_state_id: &state.id,
            new_state_id: &result.state.id,
            trigger: None,
            source: "Truncation",
        });
        info!(
            thread_id = %thread_id,
            deleted = chunk_ids.len(),
            "truncation applied"
        );

        Ok(result)
    }
}

/// First system or delegation chunk's text, as the task goal.
fn task_goal(state: &State) -> Option<String> {
    state
        .top_level_chunks()
        .find(|c| matches!(c.kind, ChunkKind::System | ChunkKind::Delegation))
        .map(|c| c.rendered())
}

/// Existing compacted summaries, joined, as the progress description.
fn progress_summary(state: &State) -> Option<String> {
    let summaries: Vec<String> = state
        .top_level_chunks()
        .filter(|c| c.kind == ChunkKind::Compacted)
        .map(|c| c.rendered())
        .collect();
    if summaries.is_empty() {
        None
    } else {
        Some(summaries.join("\n"))
    }
}

#[cfg(test)]
#[path = "compaction_tests.rs"]
mod tests;
