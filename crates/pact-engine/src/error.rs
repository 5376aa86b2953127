//! Engine failure taxonomy.
//!
//! Every variant is non-retryable from the caller's perspective except
//! `Storage`, which propagates the underlying ledger failure unchanged
//! (retry policy belongs to the storage adapter, not here).

use thiserror::Error;

use pact_core::{BridgeError, DealId, DocumentError};
use pact_ledger::LedgerError;

/// An engine operation failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Empty or malformed caller input.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The addressed user or deal does not exist.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    /// The operation lost to an earlier state change: already accepted,
    /// already claimed, already completed, or a concurrent writer won.
    /// The caller must re-query state before deciding what to do.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is not allowed to perform this operation (not a judge,
    /// justice too low).
    #[error("denied: {0}")]
    AuthorizationDenied(String),

    /// A document invariant was violated, including stage transitions
    /// outside the validated table.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The blame reversal walk revisited a deal: the chain is cyclic.
    #[error("blame chain cycle at {deal}")]
    BlameCycle { deal: DealId },

    /// The ledger store failed.
    #[error("ledger failure")]
    Storage(#[source] LedgerError),

    /// Handing the deal to the timeout watcher failed.
    #[error("scheduler failure")]
    Scheduler(#[source] BridgeError),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            // Lost compare-and-swap races and handle collisions are state
            // conflicts, not infrastructure failures.
            LedgerError::RevisionConflict { .. } | LedgerError::DuplicateHandle(_) => {
                Self::Conflict(err.to_string())
            }
            other => Self::Storage(other),
        }
    }
}
