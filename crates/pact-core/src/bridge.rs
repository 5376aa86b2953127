//! # Engine/Watcher Bridge
//!
//! The lifecycle engine hands accepted deals to the timeout watcher
//! ([`DealScheduler::hold_and_watch`]); the watcher calls back when a
//! deadline fires ([`TimeoutSink::deal_timeout`]). Each component consumes
//! the other only through these traits, so neither crate depends on the
//! other and either side can be replaced in tests.
//!
//! Errors crossing the bridge are carried as strings: the caller cannot do
//! anything type-specific with a peer's internal failure beyond logging and
//! surfacing it.

use thiserror::Error;

use crate::identity::DealId;

/// A call across the bridge failed on the far side.
#[derive(Debug, Error)]
#[error("bridge call failed: {0}")]
pub struct BridgeError(String);

impl BridgeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Accepts deals for deadline watching. Implemented by the timeout watcher.
pub trait DealScheduler: Send + Sync {
    /// Queue `deal` for resolution at `deadline` (RFC 3339). Rejects
    /// unparsable deadlines synchronously.
    fn hold_and_watch(&self, deal: DealId, deadline: &str) -> Result<(), BridgeError>;
}

/// Receives deadline expirations. Implemented by the lifecycle engine.
pub trait TimeoutSink: Send + Sync {
    /// Resolve `deal` after its deadline fired. Called at most once per
    /// watched entry under normal operation.
    fn deal_timeout(&self, deal: DealId) -> Result<(), BridgeError>;
}
