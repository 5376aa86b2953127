//! # pact-core — Foundational Types
//!
//! Shared vocabulary of the Pact Stack:
//!
//! - **Identity** ([`identity`]): UUID-backed identifier newtypes and
//!   [`PartyRef`], the "user or deal" reference a side participant holds.
//!
//! - **Deal** ([`deal`]): the negotiation document model — [`DealDocument`],
//!   its pact versions and sides, and the validated [`DealStage`] machine
//!   with an explicit transition table.
//!
//! - **User** ([`user`]): user records with status-bucket deal lists and a
//!   judge profile holding the decision history.
//!
//! - **Queue** ([`queue`]): the timeout watcher's persisted queue entry.
//!
//! - **Bridge** ([`bridge`]): the two traits that connect the lifecycle
//!   engine and the timeout watcher without either crate depending on the
//!   other.

pub mod bridge;
pub mod deal;
pub mod error;
pub mod identity;
pub mod queue;
pub mod user;

// Re-export primary types for ergonomic imports.

pub use bridge::{BridgeError, DealScheduler, TimeoutSink};
pub use deal::{
    BlameMark, DealDocument, DealKind, DealStage, Pact, PactVersion, Participant, Side, SideKind,
    StageRecord, Verdict, Winner,
};
pub use error::DocumentError;
pub use identity::{DealId, EntryId, PartyRef, UserId};
pub use queue::{EntryStatus, TimeoutEntry};
pub use user::{Decision, JudgeProfile, User};
