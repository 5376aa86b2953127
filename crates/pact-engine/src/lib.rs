//! # pact-engine — Deal Lifecycle Engine
//!
//! Owns the state machine of a deal document from drafting through judge
//! arbitration to its terminal timeout, plus the two subsystems layered on
//! it:
//!
//! - **Engine** ([`engine`]): creation, offers, acceptance, judge
//!   assignment, decisions, and timeout resolution.
//!
//! - **Blame**: reversal documents that overturn a prior deal's outcome,
//!   including the blame-of-blame chain walk. Lives on [`DealEngine`]
//!   alongside the lifecycle operations.
//!
//! - **Score** ([`score`]): pure justice/success scoring, recomputed on
//!   read from the ledger.
//!
//! The engine talks to storage through [`pact_ledger::Ledger`] and to the
//! timeout watcher through [`pact_core::DealScheduler`]; it implements
//! [`pact_core::TimeoutSink`] for the watcher's expiry callback.

pub mod engine;
pub mod error;
pub mod score;

mod blame;

pub use engine::DealEngine;
pub use error::EngineError;
pub use score::{justice, success};
