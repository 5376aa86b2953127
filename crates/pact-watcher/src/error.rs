//! Watcher failure taxonomy.

use thiserror::Error;

use pact_ledger::LedgerError;

/// A watcher operation failed.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The deadline string is not RFC 3339. Rejected synchronously, before
    /// anything is queued.
    #[error("unparsable deadline {raw:?}")]
    InvalidDeadline {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The watcher was built outside a Tokio runtime and has nowhere to
    /// spawn its timer task.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The ledger store failed.
    #[error("ledger failure")]
    Storage(#[from] LedgerError),
}
