// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake model client for deterministic testing

use super::{
    CompletionRequest, CompletionResponse, CompletionUsage, ModelClient, ModelError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Recorded call to FakeModelClient
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub request: CompletionRequest,
}

struct FakeModelState {
    /// Scripted replies, consumed front-to-back; the last one repeats.
    replies: Vec<String>,
    next_error: Option<ModelError>,
    calls: Vec<ModelCall>,
}

/// Fake model client for testing.
///
/// Returns scripted replies and records every request for assertions.
#[derive(Clone)]
pub struct FakeModelClient {
    inner: Arc<Mutex<FakeModelState>>,
}

impl FakeModelClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeModelState {
                replies: vec![reply.into()],
                next_error: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Queue an additional reply; replies are consumed in order.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.inner.lock().replies.push(reply.into());
    }

    /// Make the next call fail with the given error.
    pub fn fail_next(&self, error: ModelError) {
        self.inner.lock().next_error = Some(error);
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<ModelCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of completions served.
    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }
}

#[async_trait]
impl ModelClient for FakeModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let mut state = self.inner.lock();
        state.calls.push(ModelCall {
            request: request.clone(),
        });

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        let content = if state.replies.len() > 1 {
            state.replies.remove(0)
        } else {
            state.replies.first().cloned().unwrap_or_default()
        };

        let prompt_tokens: usize = request
            .messages
            .iter()
            .map(|m| m.content.len() / 4)
            .sum();
        Ok(CompletionResponse {
            usage: CompletionUsage {
                prompt_tokens: prompt_tokens as u32,
                completion_tokens: (content.len() / 4) as u32,
                total_tokens: (prompt_tokens + content.len() / 4) as u32,
            },
            content,
        })
    }
}
