//! # User Records
//!
//! A user's deal ids are bucketed by where the deal stands from their point
//! of view: `offered`, `accepted`, `participating`, `results_settled`. A
//! deal id lives in at most one of the first three buckets at a time and
//! moves to `results_settled` exactly once, when the deal reaches its
//! terminal stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deal::Verdict;
use crate::identity::{DealId, UserId};

/// A judge's recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub deal: DealId,
    pub verdict: Verdict,
    pub decided_at: DateTime<Utc>,
}

/// Judge-side bookkeeping, present iff the user is a judge.
///
/// A deal id is in at most one of `proposed` / `participating`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeProfile {
    /// Deals offered to this judge, awaiting a claim.
    pub proposed: Vec<DealId>,
    /// Deals this judge claimed and has yet to decide.
    pub participating: Vec<DealId>,
    /// Decision history, append-only.
    pub decisions: Vec<Decision>,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    /// Unique login handle; offers address users by it.
    pub handle: String,
    /// Every deal this user ever drafted or joined.
    pub deal_docs: Vec<DealId>,
    pub offered: Vec<DealId>,
    pub accepted: Vec<DealId>,
    pub participating: Vec<DealId>,
    pub results_settled: Vec<DealId>,
    pub is_judge: bool,
    pub judge_profile: Option<JudgeProfile>,
    /// Optimistic-concurrency token for whole-record replaces.
    pub revision: u64,
}

impl User {
    /// A fresh user with empty buckets. Judges start with an empty profile.
    pub fn new(name: String, surname: String, handle: String, is_judge: bool) -> Self {
        Self {
            id: UserId::new(),
            name,
            surname,
            handle,
            deal_docs: Vec::new(),
            offered: Vec::new(),
            accepted: Vec::new(),
            participating: Vec::new(),
            results_settled: Vec::new(),
            is_judge,
            judge_profile: is_judge.then(JudgeProfile::default),
            revision: 0,
        }
    }

    /// Record an offer. Returns `false` (and changes nothing) if the deal
    /// already sits in `offered` or `accepted` — offers are idempotent and
    /// must not reveal that to the offering party.
    pub fn record_offer(&mut self, deal: &DealId) -> bool {
        if self.offered.contains(deal) || self.accepted.contains(deal) {
            return false;
        }
        self.offered.push(deal.clone());
        true
    }

    /// Move a deal from `offered` to `accepted`. `false` if it was not
    /// offered.
    pub fn accept_offer(&mut self, deal: &DealId) -> bool {
        if !remove_from(&mut self.offered, deal) {
            return false;
        }
        self.accepted.push(deal.clone());
        true
    }

    /// Move a deal from `accepted` to `participating` (the deal went live).
    /// `false` if the user never accepted it.
    pub fn start_participating(&mut self, deal: &DealId) -> bool {
        if !remove_from(&mut self.accepted, deal) {
            return false;
        }
        self.participating.push(deal.clone());
        true
    }

    /// Move a deal from `participating` to `results_settled` (terminal
    /// notification). `false` if the user was not participating.
    pub fn settle_result(&mut self, deal: &DealId) -> bool {
        if !remove_from(&mut self.participating, deal) {
            return false;
        }
        self.results_settled.push(deal.clone());
        true
    }
}

fn remove_from(bucket: &mut Vec<DealId>, deal: &DealId) -> bool {
    match bucket.iter().position(|d| d == deal) {
        Some(i) => {
            bucket.remove(i);
            true
        }
        None => false,
    }
}

impl JudgeProfile {
    /// Record a proposition unless the deal is already proposed or claimed.
    pub fn propose(&mut self, deal: &DealId) -> bool {
        if self.proposed.contains(deal) || self.participating.contains(deal) {
            return false;
        }
        self.proposed.push(deal.clone());
        true
    }

    /// Move a deal from `proposed` to `participating` (the judge claimed
    /// it). `false` if it was never proposed.
    pub fn claim(&mut self, deal: &DealId) -> bool {
        if !remove_from(&mut self.proposed, deal) {
            return false;
        }
        self.participating.push(deal.clone());
        true
    }

    /// Drop a stale proposition (the deal was claimed by another judge).
    pub fn drop_proposition(&mut self, deal: &DealId) {
        remove_from(&mut self.proposed, deal);
    }

    /// Remove a decided deal from `participating`. `false` if the judge
    /// was not participating in it.
    pub fn conclude(&mut self, deal: &DealId) -> bool {
        remove_from(&mut self.participating, deal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "Alice".to_string(),
            "Arden".to_string(),
            "alice".to_string(),
            false,
        )
    }

    #[test]
    fn judge_flag_controls_profile_presence() {
        assert!(user().judge_profile.is_none());
        let judge = User::new("J".into(), "Udge".into(), "j1".into(), true);
        assert!(judge.judge_profile.is_some());
    }

    #[test]
    fn deal_lives_in_one_bucket_at_a_time() {
        let mut u = user();
        let deal = DealId::new();
        assert!(u.record_offer(&deal));
        assert!(u.accept_offer(&deal));
        assert!(!u.offered.contains(&deal));
        assert!(u.start_participating(&deal));
        assert!(!u.accepted.contains(&deal));
        assert!(u.settle_result(&deal));
        assert!(!u.participating.contains(&deal));
        assert_eq!(u.results_settled, vec![deal]);
    }

    #[test]
    fn repeat_offers_are_swallowed() {
        let mut u = user();
        let deal = DealId::new();
        assert!(u.record_offer(&deal));
        assert!(!u.record_offer(&deal));
        assert_eq!(u.offered.len(), 1);
        u.accept_offer(&deal);
        // Still swallowed after acceptance.
        assert!(!u.record_offer(&deal));
    }

    #[test]
    fn bucket_moves_fail_without_the_source_entry() {
        let mut u = user();
        let deal = DealId::new();
        assert!(!u.accept_offer(&deal));
        assert!(!u.start_participating(&deal));
        assert!(!u.settle_result(&deal));
    }

    #[test]
    fn claimed_deal_leaves_propositions() {
        let mut p = JudgeProfile::default();
        let deal = DealId::new();
        assert!(p.propose(&deal));
        assert!(!p.propose(&deal));
        assert!(p.claim(&deal));
        assert!(p.proposed.is_empty());
        // Participating blocks re-proposing.
        assert!(!p.propose(&deal));
    }
}
