//! # Timeout Queue Entry
//!
//! The timeout watcher persists one [`TimeoutEntry`] per deal it was asked
//! to watch, in a collection of its own (`deal_waiting_queue`) so the
//! watcher can restart independently of the deal documents and recover the
//! single-timer invariant from the `Watching`-flagged row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{DealId, EntryId};

/// Where a queue entry stands. At most one entry holds `Watching` at any
/// instant — the invariant the watcher exists to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Waiting for its turn at the single timer.
    Queued,
    /// Bound to the live in-memory timer.
    Watching,
    /// Its deadline fired and the engine was notified.
    Processed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Watching => "WATCHING",
            Self::Processed => "PROCESSED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One watched deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutEntry {
    pub id: EntryId,
    pub deal: DealId,
    pub deadline: DateTime<Utc>,
    pub status: EntryStatus,
}

impl TimeoutEntry {
    /// A fresh queued entry.
    pub fn new(deal: DealId, deadline: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            deal,
            deadline,
            status: EntryStatus::Queued,
        }
    }
}
