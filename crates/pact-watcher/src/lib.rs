//! # pact-watcher — Deadline Watcher
//!
//! Watches deal deadlines on behalf of the lifecycle engine. Deals arrive
//! through [`pact_core::DealScheduler::hold_and_watch`], are persisted as
//! [`pact_core::TimeoutEntry`] rows, and fire back into the engine through
//! [`pact_core::TimeoutSink::deal_timeout`].
//!
//! ## Single-Timer Invariant
//!
//! However many deals sit in the queue, exactly one in-memory timer is ever
//! live, bound to the earliest deadline; at most one queue row carries the
//! `Watching` status. A new deal with an earlier deadline preempts the live
//! timer; the superseded row returns to `Queued` and gets its turn later.
//! The `Watching` row doubles as the crash marker: [`TimeoutWatcher::recover`]
//! re-arms it on boot.

pub mod error;
pub mod watcher;

pub use error::WatcherError;
pub use watcher::TimeoutWatcher;
