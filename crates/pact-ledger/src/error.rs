//! Ledger failure taxonomy.

use thiserror::Error;

/// A storage operation failed.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The record addressed by a mutating call does not exist.
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: String },

    /// A replace presented a revision older than the stored one: another
    /// writer got there first. The caller must re-read and retry or give up.
    #[error("{collection} record {id} was modified concurrently")]
    RevisionConflict { collection: &'static str, id: String },

    /// A user insert collided on the unique handle index.
    #[error("handle {0:?} is already registered")]
    DuplicateHandle(String),

    /// Backend I/O failure. Not produced by the in-memory ledger; real
    /// drivers surface their transport errors here.
    #[error("ledger i/o: {0}")]
    Io(String),
}
