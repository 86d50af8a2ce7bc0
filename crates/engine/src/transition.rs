// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State transition: interpret operations against an immutable prior state.
//!
//! Operations apply strictly in order. After the last operation, chunks left
//! with no reference from `chunk_ids` or any surviving container's
//! `child_ids` are dropped from the map, so a replaced container takes its
//! orphaned children with it.

use crate::error::EngineError;
use crate::registry::ReducerOutput;
use engram_core::{
    Chunk, ChunkId, LlmResponseRequirement, OperationKind, Provenance, State, StateId,
    StateMetadata,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Inputs describing the transition being applied.
pub struct TransitionContext {
    pub provenance: Provenance,
    /// Name recorded as the state's `source_operation` (reducer name,
    /// "compaction", "truncation", …).
    pub source_operation: String,
    pub requirement: LlmResponseRequirement,
}

/// A successor state plus the chunk delta that produced it.
#[derive(Debug)]
pub struct TransitionResult {
    pub state: State,
    pub added_chunks: Vec<Chunk>,
    pub removed_chunk_ids: Vec<ChunkId>,
}

/// Apply a reducer output to a prior state, producing the successor.
///
/// The prior state is never touched; failures leave no partial result.
pub fn apply(
    prior: &State,
    output: &ReducerOutput,
    ctx: TransitionContext,
) -> Result<TransitionResult, EngineError> {
    let pool: HashMap<&ChunkId, &Chunk> = output.chunks.iter().map(|c| (&c.id, c)).collect();

    let mut chunk_ids = prior.chunk_ids.clone();
    let mut chunks: IndexMap<ChunkId, Chunk> = prior.chunks.clone();

    let resolve = |id: &ChunkId| -> Result<Chunk, EngineError> {
        pool.get(id)
            .map(|c| (*c).clone())
            .ok_or_else(|| EngineError::not_found("chunk", id))
    };

    for operation in &output.operations {
        match &operation.kind {
            OperationKind::Add { chunk_id } => {
                let chunk = resolve(chunk_id)?;
                if !chunk_ids.contains(chunk_id) {
                    chunk_ids.push(chunk_id.clone());
                }
                chunks.insert(chunk_id.clone(), chunk);
            }

            OperationKind::Delete { chunk_id } => {
                if chunks.shift_remove(chunk_id).is_none() {
                    return Err(EngineError::invariant(format!(
                        "delete of non-existent chunk {chunk_id}"
                    )));
                }
                chunk_ids.retain(|id| id != chunk_id);
            }

            OperationKind::Update { old_id, new_id } => {
                if !chunks.contains_key(old_id) {
                    return Err(EngineError::invariant(format!(
                        "update with missing original {old_id}"
                    )));
                }
                let chunk = resolve(new_id)?;
                if let Some(position) = chunk_ids.iter().position(|id| id == old_id) {
                    chunk_ids[position] = new_id.clone();
                }
                chunks.shift_remove(old_id);
                chunks.insert(new_id.clone(), chunk);
            }

            OperationKind::BatchReplace { old_ids, new_id } => {
                for old_id in old_ids {
                    if !chunks.contains_key(old_id) {
                        return Err(EngineError::invariant(format!(
                            "batch replace with missing original {old_id}"
                        )));
                    }
                }
                let chunk = resolve(new_id)?;
                let first_position = old_ids
                    .first()
                    .and_then(|first| chunk_ids.iter().position(|id| id == first));
                match first_position {
                    Some(position) => chunk_ids.insert(position, new_id.clone()),
                    None => chunk_ids.push(new_id.clone()),
                }
                chunk_ids.retain(|id| !old_ids.contains(id));
                for old_id in old_ids {
                    chunks.shift_remove(old_id);
                }
                chunks.insert(new_id.clone(), chunk);
            }

            OperationKind::AddChild {
                parent_id,
                child_id,
            } => {
                // The parent may be the container being superseded by a
                // later Update in the same batch; it just has to exist now.
                if !chunks.contains_key(parent_id) && !pool.contains_key(parent_id) {
                    return Err(EngineError::invariant(format!(
                        "add child to missing parent {parent_id}"
                    )));
                }
                let chunk = resolve(child_id)?;
                chunks.insert(child_id.clone(), chunk);
            }
        }
    }

    drop_orphans(&chunk_ids, &mut chunks);

    let added_chunks: Vec<Chunk> = chunks
        .values()
        .filter(|c| !prior.chunks.contains_key(&c.id))
        .cloned()
        .collect();
    let removed_chunk_ids: Vec<ChunkId> = prior
        .chunks
        .keys()
        .filter(|id| !chunks.contains_key(*id))
        .cloned()
        .collect();

    let state = State {
        id: StateId::new(),
        thread_id: prior.thread_id.clone(),
        chunk_ids,
        chunks,
        metadata: StateMetadata {
            previous_state_id: Some(prior.id.clone()),
            source_operation: Some(ctx.source_operation),
            provenance: Some(ctx.provenance),
        },
        need_llm_continue_response: match ctx.requirement {
            LlmResponseRequirement::Keep => prior.need_llm_continue_response,
            LlmResponseRequirement::Set => true,
            LlmResponseRequirement::Clear => false,
        },
    };

    Ok(TransitionResult {
        state,
        added_chunks,
        removed_chunk_ids,
    })
}

/// Drop chunks unreachable from `chunk_ids` through container references.
fn drop_orphans(chunk_ids: &[ChunkId], chunks: &mut IndexMap<ChunkId, Chunk>) {
    let mut reachable: HashSet<ChunkId> = HashSet::new();
    let mut frontier: VecDeque<ChunkId> = chunk_ids.iter().cloned().collect();

    while let Some(id) = frontier.pop_front() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        if let Some(children) = chunks.get(&id).and_then(|c| c.child_ids.clone()) {
            frontier.extend(children);
        }
    }

    chunks.retain(|id, _| reachable.contains(id));
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
