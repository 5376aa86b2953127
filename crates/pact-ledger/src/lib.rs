//! # pact-ledger — Ledger Store Boundary
//!
//! Durable storage as the rest of the stack sees it: three logical
//! collections (`users`, `deal_documents`, `deal_waiting_queue`) behind the
//! [`Ledger`] trait. The trait is the persistence seam — driver details
//! (Postgres, Mongo, ...) live behind it and are out of scope here; the
//! in-memory [`MemoryLedger`] serves tests and single-process deployments.
//!
//! ## Concurrency contract
//!
//! Reads return clones. Whole-document replaces are compare-and-swap on the
//! record's `revision` token: a replace presenting a stale revision fails
//! with [`LedgerError::RevisionConflict`], which makes lost read-modify-
//! write races explicit instead of silently last-write-wins.

pub mod error;
pub mod memory;

pub use error::LedgerError;
pub use memory::MemoryLedger;

use pact_core::{DealDocument, DealId, EntryId, EntryStatus, TimeoutEntry, User, UserId};

/// The storage contract of the Pact Stack.
///
/// Mutators return [`LedgerError`]; lookups distinguish "absent" (`None`)
/// from storage failure (`Err`).
pub trait Ledger: Send + Sync {
    // -- users ------------------------------------------------------------

    /// Insert a new user. Fails with [`LedgerError::DuplicateHandle`] if
    /// the handle is taken.
    fn insert_user(&self, user: User) -> Result<(), LedgerError>;

    fn user(&self, id: &UserId) -> Result<Option<User>, LedgerError>;

    fn user_by_handle(&self, handle: &str) -> Result<Option<User>, LedgerError>;

    /// Replace a user record. CAS on `revision`; bumps it on success.
    fn replace_user(&self, user: User) -> Result<(), LedgerError>;

    /// Every user with the judge flag set.
    fn judges(&self) -> Result<Vec<User>, LedgerError>;

    // -- deal documents ---------------------------------------------------

    fn insert_deal(&self, deal: DealDocument) -> Result<(), LedgerError>;

    fn deal(&self, id: &DealId) -> Result<Option<DealDocument>, LedgerError>;

    /// Replace a deal document. CAS on `revision`; bumps it on success.
    fn replace_deal(&self, deal: DealDocument) -> Result<(), LedgerError>;

    /// Every completed deal document (scorer input).
    fn completed_deals(&self) -> Result<Vec<DealDocument>, LedgerError>;

    // -- timeout queue ----------------------------------------------------

    fn enqueue(&self, entry: TimeoutEntry) -> Result<(), LedgerError>;

    fn entry(&self, id: &EntryId) -> Result<Option<TimeoutEntry>, LedgerError>;

    fn set_entry_status(&self, id: &EntryId, status: EntryStatus) -> Result<(), LedgerError>;

    /// The entry the timer should be bound to: the `Watching` row if one
    /// exists, else the earliest-deadline `Queued` row. `Processed` rows
    /// never match.
    fn first_due(&self) -> Result<Option<TimeoutEntry>, LedgerError>;

    /// Every queue entry, in no particular order.
    fn entries(&self) -> Result<Vec<TimeoutEntry>, LedgerError>;
}
