// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step-lock protocol shared by the event processor and background
//! operations (compaction, truncation, debug edits).
//!
//! Every state-mutating path runs inside a step: create the running step
//! record, install its id as the thread's lock, do the work, then finalize
//! the step and clear the lock. A failure finalizes the step as failed but
//! still clears the lock.

use crate::error::EngineError;
use engram_core::{Chunk, State, StateId, Step, Thread};
use engram_storage::Storage;
use std::sync::Arc;

/// Acquire the step lock by creating a running step.
///
/// Fails with `StepInProgress` when another step already holds the lock.
pub(crate) async fn begin_step(
    storage: &Arc<dyn Storage>,
    thread: &mut Thread,
    trigger: &str,
    event_payload: serde_json::Value,
    now_ms: u64,
) -> Result<Step, EngineError> {
    if let Some(step_id) = &thread.current_step_id {
        return Err(EngineError::StepInProgress {
            thread_id: thread.id.clone(),
            step_id: step_id.clone(),
        });
    }

    let step = Step::start(
        thread.id.clone(),
        trigger,
        event_payload,
        thread.current_state_id.clone(),
        now_ms,
    );
    storage.save_step(&step).await?;

    thread.current_step_id = Some(step.id.clone());
    storage.save_thread(thread).await?;

    Ok(step)
}

/// Persist a successor state and finalize the step.
///
/// Write order: chunks, then the state, then the step, then the thread head
/// rewrite that also releases the lock. A crash mid-sequence leaves the
/// thread head unchanged and the lock held, which `release_stale_lock`
/// recovers from.
pub(crate) async fn commit_step(
    storage: &Arc<dyn Storage>,
    thread: &mut Thread,
    step: &mut Step,
    state: &State,
    added_chunks: &[Chunk],
    now_ms: u64,
) -> Result<(), EngineError> {
    verify_holder(thread, step)?;
    for chunk in added_chunks {
        storage.save_chunk(chunk).await?;
    }
    storage.save_state(state).await?;

    step.complete(state.id.clone(), now_ms);
    storage.update_step(step).await?;

    thread.advance_to(state.id.clone(), now_ms);
    thread.current_step_id = None;
    storage.save_thread(thread).await?;

    Ok(())
}

/// Finalize the step as completed without a new state (no-op result).
pub(crate) async fn complete_step_noop(
    storage: &Arc<dyn Storage>,
    thread: &mut Thread,
    step: &mut Step,
    state_id: StateId,
    now_ms: u64,
) -> Result<(), EngineError> {
    verify_holder(thread, step)?;
    step.complete(state_id, now_ms);
    storage.update_step(step).await?;

    thread.current_step_id = None;
    storage.save_thread(thread).await?;

    Ok(())
}

/// Finalize the step as failed and release the lock.
///
/// Best-effort: storage failures here are swallowed so the original error
/// propagates to the caller.
pub(crate) async fn fail_step(
    storage: &Arc<dyn Storage>,
    thread: &mut Thread,
    step: &mut Step,
    error: &str,
    now_ms: u64,
) {
    step.fail(error, now_ms);
    let _ = storage.update_step(step).await;

    // Only the holder may release the lock.
    if thread.current_step_id.as_ref() == Some(&step.id) {
        thread.current_step_id = None;
        let _ = storage.save_thread(thread).await;
    }
}

/// Release is only legal for the step that holds the lock.
fn verify_holder(thread: &Thread, step: &Step) -> Result<(), EngineError> {
    if thread.current_step_id.as_ref() != Some(&step.id) {
        return Err(EngineError::invariant(format!(
            "step {} does not hold the lock for {}",
            step.id, thread.id
        )));
    }
    Ok(())
}
