// src/sink/mod.rs
// =============================================================================
// This module owns the output file.
//
// Every download task line produced by the crawl ends up here. A single
// writer task:
// - drops lines whose resource URL was already written
// - stops after the configured number of lines
// - raises the global stop signal that tells everyone else to wind down
//
// Submodules:
// - retry: a bounded queue insert that gives up once the sink has stopped
// - writer: the sink itself and the handle producers write through
// =============================================================================

mod retry;
mod writer;

use tokio_util::sync::CancellationToken;

pub use retry::RetryQueue;
pub use writer::{Sink, SinkConfig, SinkHandle, SinkReport, SinkState, StopReason};

/// Read-only view of the global stop signal.
///
/// Only the sink can raise it (it keeps the underlying token to itself);
/// every other component just polls `is_set()` or awaits `wait()`.
#[derive(Debug, Clone)]
pub struct StopSignal(CancellationToken);

impl StopSignal {
    fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the sink has stopped.
    pub async fn wait(&self) {
        self.0.cancelled().await
    }
}

#[cfg(test)]
impl StopSignal {
    /// A signal that is already raised, for tests of stop-aware producers.
    pub fn raised() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self(token)
    }

    pub fn never() -> Self {
        Self(CancellationToken::new())
    }
}
