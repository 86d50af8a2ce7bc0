// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tiktoken-backed tokenizer.
//!
//! Wraps the cl100k_base encoding behind the core tokenizer trait. Loading
//! the BPE table is expensive, so callers should go through
//! `engram_core::TokenizerCache` rather than constructing per call.

use engram_core::tokenizer::{HeuristicTokenizer, Tokenizer, TokenizerCache};
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Errors that can occur loading a tokenizer encoding
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("failed to load encoding: {0}")]
    EncodingLoad(String),
}

/// cl100k_base tokenizer for OpenAI-family models.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenTokenizer {
    /// Build for a model name. Fails only if the encoding table cannot load.
    pub fn cl100k(model: impl Into<String>) -> Result<Self, TokenizerError> {
        let bpe = cl100k_base().map_err(|e| TokenizerError::EncodingLoad(e.to_string()))?;
        Ok(Self {
            bpe,
            model: model.into(),
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        self.bpe.decode(tokens.to_vec()).unwrap_or_default()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A tokenizer cache that resolves every model to cl100k_base, falling back
/// to the character heuristic when the encoding table fails to load.
pub fn cl100k_cache() -> TokenizerCache {
    TokenizerCache::new(Box::new(|model| match TiktokenTokenizer::cl100k(model) {
        Ok(tokenizer) => Arc::new(tokenizer) as Arc<dyn Tokenizer>,
        Err(e) => {
            warn!(model, error = %e, "cl100k load failed, using heuristic tokenizer");
            Arc::new(HeuristicTokenizer::new(model)) as Arc<dyn Tokenizer>
        }
    }))
}
