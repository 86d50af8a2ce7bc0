// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token counting seam.
//!
//! The runtime only ever needs counts; real encoders plug in behind the
//! trait (see the adapters crate for the tiktoken-backed one). The
//! heuristic fallback approximates four characters per token, which is
//! close enough to gate compaction when no encoder is available.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A tokenizer for one named encoding.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;
    fn model_name(&self) -> &str;
}

/// Character-count fallback (~4 chars per token).
pub struct HeuristicTokenizer {
    model: String,
}

impl HeuristicTokenizer {
    pub const CHARS_PER_TOKEN: usize = 4;

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new("heuristic")
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(Self::CHARS_PER_TOKEN)
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        // Code points stand in for tokens; decode() inverts exactly.
        text.chars().map(|c| c as u32).collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        tokens
            .iter()
            .filter_map(|&t| char::from_u32(t))
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory producing a tokenizer for a model name.
pub type TokenizerFactory = dyn Fn(&str) -> Arc<dyn Tokenizer> + Send + Sync;

/// Per-model tokenizer cache.
///
/// Construction of real encoders is expensive (BPE table load); the cache
/// builds each model's tokenizer once and hands out shared handles.
pub struct TokenizerCache {
    factory: Box<TokenizerFactory>,
    cache: RwLock<HashMap<String, Arc<dyn Tokenizer>>>,
}

impl TokenizerCache {
    pub fn new(factory: Box<TokenizerFactory>) -> Self {
        Self {
            factory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A cache whose every model resolves to the heuristic fallback.
    pub fn heuristic() -> Self {
        Self::new(Box::new(|model| {
            Arc::new(HeuristicTokenizer::new(model)) as Arc<dyn Tokenizer>
        }))
    }

    pub fn get(&self, model: &str) -> Arc<dyn Tokenizer> {
        if let Some(tokenizer) = self.cache.read().get(model) {
            return Arc::clone(tokenizer);
        }
        let tokenizer = (self.factory)(model);
        self.cache
            .write()
            .entry(model.to_string())
            .or_insert_with(|| Arc::clone(&tokenizer));
        tokenizer
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

#[cfg(test)]
#[path = "tokenizer_tests.rs"]
mod tests;
