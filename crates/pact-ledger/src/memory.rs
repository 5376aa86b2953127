//! # In-Memory Ledger
//!
//! DashMap-backed [`Ledger`] implementation. Each collection is one map;
//! the unique handle index is a second map over users. Replace operations
//! validate the presented revision against the stored one under the entry's
//! write lock, so the check-and-bump is atomic per record.

use dashmap::DashMap;

use pact_core::{DealDocument, DealId, EntryId, EntryStatus, TimeoutEntry, User, UserId};

use crate::error::LedgerError;
use crate::Ledger;

/// In-memory ledger for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryLedger {
    users: DashMap<UserId, User>,
    handles: DashMap<String, UserId>,
    deals: DashMap<DealId, DealDocument>,
    queue: DashMap<EntryId, TimeoutEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn insert_user(&self, user: User) -> Result<(), LedgerError> {
        // Claim the handle first; the vacant check and the insert happen
        // under the handle entry's lock.
        match self.handles.entry(user.handle.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(LedgerError::DuplicateHandle(user.handle));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    fn user_by_handle(&self, handle: &str) -> Result<Option<User>, LedgerError> {
        let Some(id) = self.handles.get(handle).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.user(&id)
    }

    fn replace_user(&self, mut user: User) -> Result<(), LedgerError> {
        let mut stored = self.users.get_mut(&user.id).ok_or(LedgerError::NotFound {
            collection: "users",
            id: user.id.to_string(),
        })?;
        if stored.revision != user.revision {
            return Err(LedgerError::RevisionConflict {
                collection: "users",
                id: user.id.to_string(),
            });
        }
        user.revision += 1;
        *stored = user;
        Ok(())
    }

    fn judges(&self) -> Result<Vec<User>, LedgerError> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.is_judge)
            .map(|u| u.clone())
            .collect())
    }

    fn insert_deal(&self, deal: DealDocument) -> Result<(), LedgerError> {
        self.deals.insert(deal.id.clone(), deal);
        Ok(())
    }

    fn deal(&self, id: &DealId) -> Result<Option<DealDocument>, LedgerError> {
        Ok(self.deals.get(id).map(|d| d.clone()))
    }

    fn replace_deal(&self, mut deal: DealDocument) -> Result<(), LedgerError> {
        let mut stored = self.deals.get_mut(&deal.id).ok_or(LedgerError::NotFound {
            collection: "deal_documents",
            id: deal.id.to_string(),
        })?;
        if stored.revision != deal.revision {
            return Err(LedgerError::RevisionConflict {
                collection: "deal_documents",
                id: deal.id.to_string(),
            });
        }
        deal.revision += 1;
        *stored = deal;
        Ok(())
    }

    fn completed_deals(&self) -> Result<Vec<DealDocument>, LedgerError> {
        Ok(self
            .deals
            .iter()
            .filter(|d| d.completed)
            .map(|d| d.clone())
            .collect())
    }

    fn enqueue(&self, entry: TimeoutEntry) -> Result<(), LedgerError> {
        self.queue.insert(entry.id.clone(), entry);
        Ok(())
    }

    fn entry(&self, id: &EntryId) -> Result<Option<TimeoutEntry>, LedgerError> {
        Ok(self.queue.get(id).map(|e| e.clone()))
    }

    fn set_entry_status(&self, id: &EntryId, status: EntryStatus) -> Result<(), LedgerError> {
        let mut entry = self.queue.get_mut(id).ok_or(LedgerError::NotFound {
            collection: "deal_waiting_queue",
            id: id.to_string(),
        })?;
        entry.status = status;
        Ok(())
    }

    fn first_due(&self) -> Result<Option<TimeoutEntry>, LedgerError> {
        if let Some(watching) = self
            .queue
            .iter()
            .find(|e| e.status == EntryStatus::Watching)
        {
            return Ok(Some(watching.clone()));
        }
        Ok(self
            .queue
            .iter()
            .filter(|e| e.status == EntryStatus::Queued)
            .min_by_key(|e| e.deadline)
            .map(|e| e.clone()))
    }

    fn entries(&self) -> Result<Vec<TimeoutEntry>, LedgerError> {
        Ok(self.queue.iter().map(|e| e.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user(handle: &str) -> User {
        User::new("N".into(), "S".into(), handle.into(), false)
    }

    #[test]
    fn duplicate_handles_rejected() {
        let ledger = MemoryLedger::new();
        ledger.insert_user(user("alice")).unwrap();
        assert!(matches!(
            ledger.insert_user(user("alice")),
            Err(LedgerError::DuplicateHandle(_))
        ));
    }

    #[test]
    fn handle_lookup_round_trips() {
        let ledger = MemoryLedger::new();
        let alice = user("alice");
        let id = alice.id.clone();
        ledger.insert_user(alice).unwrap();
        assert_eq!(ledger.user_by_handle("alice").unwrap().unwrap().id, id);
        assert!(ledger.user_by_handle("bob").unwrap().is_none());
    }

    #[test]
    fn stale_revision_replace_is_a_conflict() {
        let ledger = MemoryLedger::new();
        let alice = user("alice");
        ledger.insert_user(alice.clone()).unwrap();

        // First writer wins and bumps the revision.
        let first = ledger.user(&alice.id).unwrap().unwrap();
        ledger.replace_user(first.clone()).unwrap();
        assert_eq!(ledger.user(&alice.id).unwrap().unwrap().revision, 1);

        // Second writer still holds revision 0.
        assert!(matches!(
            ledger.replace_user(first),
            Err(LedgerError::RevisionConflict { .. })
        ));
    }

    #[test]
    fn first_due_prefers_the_watching_row() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let soon = TimeoutEntry::new(DealId::new(), now + Duration::seconds(1));
        let mut later = TimeoutEntry::new(DealId::new(), now + Duration::seconds(60));
        later.status = EntryStatus::Watching;
        ledger.enqueue(soon).unwrap();
        ledger.enqueue(later.clone()).unwrap();
        // The watching row wins even with a later deadline.
        assert_eq!(ledger.first_due().unwrap().unwrap().id, later.id);
    }

    #[test]
    fn first_due_picks_minimum_deadline_among_queued() {
        let ledger = MemoryLedger::new();
        let now = Utc::now();
        let d1 = TimeoutEntry::new(DealId::new(), now + Duration::seconds(10));
        let d2 = TimeoutEntry::new(DealId::new(), now + Duration::seconds(2));
        let mut done = TimeoutEntry::new(DealId::new(), now + Duration::seconds(1));
        done.status = EntryStatus::Processed;
        ledger.enqueue(d1).unwrap();
        ledger.enqueue(d2.clone()).unwrap();
        ledger.enqueue(done).unwrap();
        assert_eq!(ledger.first_due().unwrap().unwrap().id, d2.id);
    }

    #[test]
    fn first_due_empty_queue_is_none() {
        let ledger = MemoryLedger::new();
        assert!(ledger.first_due().unwrap().is_none());
    }
}
