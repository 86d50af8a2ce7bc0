//! Test helpers for behavioral specifications.
//!
//! Provides a wired-up runtime over the in-memory backend and fake
//! collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use engram_adapters::FakeModelClient;
use engram_core::{FakeClock, HeuristicTokenizer, Thread};
use engram_engine::{
    DebugController, EngineConfig, EngineDeps, Orchestrator, TokenThresholds,
};
use engram_storage::MemoryStorage;
use std::sync::Arc;

pub use engram_core::test_support::*;

/// A fully wired runtime for one spec.
pub struct Runtime {
    pub storage: MemoryStorage,
    pub model: FakeModelClient,
    pub clock: FakeClock,
    pub orchestrator: Arc<Orchestrator<FakeClock>>,
    pub debug: DebugController<FakeClock>,
}

/// Runtime with default (high) thresholds: no budget pressure.
pub fn runtime() -> Runtime {
    runtime_with(TokenThresholds::default())
}

/// Runtime with explicit token thresholds.
pub fn runtime_with(thresholds: TokenThresholds) -> Runtime {
    let storage = MemoryStorage::new();
    let model = FakeModelClient::new("compacted: earlier conversation summary");
    let clock = FakeClock::new();
    let deps = EngineDeps {
        storage: Arc::new(storage.clone()),
        model: Arc::new(model.clone()),
        tokenizer: Arc::new(HeuristicTokenizer::default()),
    };
    let orchestrator = Arc::new(Orchestrator::new(
        deps,
        EngineConfig { thresholds },
        clock.clone(),
    ));
    Runtime {
        storage,
        model,
        clock,
        debug: DebugController::new(Arc::clone(&orchestrator)),
        orchestrator,
    }
}

impl Runtime {
    /// Create a fresh thread with an empty initial state.
    pub async fn thread(&self) -> Thread {
        self.orchestrator.create_thread().await.unwrap()
    }
}
