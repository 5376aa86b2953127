//! # Justice/Success Scorer
//!
//! Pure functions recomputed on every read — a deal's blame mark can flip
//! long after it settled, so neither score is ever cached.
//!
//! - **Success** rates a participant: `+2` per settled deal whose outcome
//!   (after blame inversion) favored their side, `−2` otherwise.
//! - **Justice** rates a judge: `+2` per affirmed decision, `−4` per
//!   overturned one — being overturned costs twice what being affirmed
//!   earns.

use pact_core::{BlameMark, DealDocument, DealId, PartyRef, User, UserId, Winner};
use pact_ledger::Ledger;

use crate::error::EngineError;

/// A participant's accumulated outcome score across their settled deals.
///
/// A deal that is not yet completed contributes 0 and is not an error.
pub fn success(ledger: &dyn Ledger, user: &User) -> Result<i64, EngineError> {
    let mut total = 0;
    for deal_id in &user.results_settled {
        total += deal_success(ledger, &user.id, deal_id)?;
    }
    Ok(total)
}

/// This user's score contribution from one settled deal:
/// `side(±1) * winner(±1) * not_blamed(±1) * 2`.
fn deal_success(ledger: &dyn Ledger, user: &UserId, deal_id: &DealId) -> Result<i64, EngineError> {
    let deal = ledger.deal(deal_id)?.ok_or_else(|| EngineError::NotFound {
        what: "deal",
        id: deal_id.to_string(),
    })?;
    if !deal.completed {
        return Ok(0);
    }
    let pact = deal.current_pact()?;
    let party = PartyRef::User(user.clone());
    let side_sign = if pact.red.contains(&party) {
        1
    } else if pact.blue.contains(&party) {
        -1
    } else {
        return Err(EngineError::Validation(format!(
            "user {user} is on neither side of deal {deal_id}"
        )));
    };
    let win_sign = match deal.winner {
        Some(Winner::Red) => 1,
        Some(Winner::Blue) => -1,
        None => {
            return Err(EngineError::Validation(format!(
                "completed deal {deal_id} has no winner"
            )))
        }
    };
    let blame_sign = match deal.blame {
        Some(BlameMark::No) => 1,
        Some(BlameMark::Yes) => -1,
        None => {
            return Err(EngineError::Validation(format!(
                "completed deal {deal_id} has no blame mark"
            )))
        }
    };
    Ok(side_sign * win_sign * blame_sign * 2)
}

/// A judge's accumulated credibility from past decisions: `+2` per decided
/// deal whose blame mark is currently `No`, `−4` per `Yes`.
///
/// Only decisions on completed deals count. Fails for users without a
/// judge profile.
pub fn justice(ledger: &dyn Ledger, judge: &User) -> Result<i64, EngineError> {
    let profile = match (&judge.judge_profile, judge.is_judge) {
        (Some(profile), true) => profile,
        _ => {
            return Err(EngineError::Validation(format!(
                "cannot score justice of common user {}",
                judge.id
            )))
        }
    };
    let completed = ledger.completed_deals()?;
    let mut total = 0;
    for decision in &profile.decisions {
        if let Some(deal) = completed.iter().find(|d| d.id == decision.deal) {
            total += judge_justice(&judge.id, deal)?;
        }
    }
    Ok(total)
}

fn judge_justice(judge: &UserId, deal: &DealDocument) -> Result<i64, EngineError> {
    if !deal.judge.contains(&PartyRef::User(judge.clone())) {
        return Err(EngineError::Validation(format!(
            "judge {judge} is not on the judge side of deal {}",
            deal.id
        )));
    }
    // A single judge decides alone today, so the recorded winner is that
    // judge's verdict; with multiple judges this must compare the judge's
    // own decision against the deal outcome.
    match deal.blame {
        Some(BlameMark::No) => Ok(2),
        Some(BlameMark::Yes) => Ok(-4),
        None => Err(EngineError::Validation(format!(
            "completed deal {} has no blame mark",
            deal.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_core::{DealDocument, Decision, Participant, User, Verdict};
    use pact_ledger::MemoryLedger;
    use proptest::prelude::*;

    fn judge_user() -> User {
        User::new("J".into(), "Udge".into(), "j1".into(), true)
    }

    /// A completed deal decided by `judge`, red side `user` vs blue side
    /// `rival`, with the given winner and blame mark.
    fn settled_deal(
        judge: &UserId,
        user: &UserId,
        rival: &UserId,
        winner: Winner,
        blamed: bool,
    ) -> DealDocument {
        let mut deal = DealDocument::new_common(
            user.clone(),
            "terms".to_string(),
            "2099-01-01T00:00:00.000Z".to_string(),
        );
        deal.current_pact_mut()
            .unwrap()
            .blue
            .push(Participant::accepted(rival.clone()));
        deal.judge.push(Participant::accepted(judge.clone()));
        deal.winner = Some(winner);
        deal.blame = Some(if blamed { BlameMark::Yes } else { BlameMark::No });
        deal.completed = true;
        deal
    }

    #[test]
    fn success_counts_wins_and_blame_inversions() {
        let ledger = MemoryLedger::new();
        let judge = judge_user();
        let alice = UserId::new();
        let bob = UserId::new();

        // Alice (red) won, unblamed: +2.
        let won = settled_deal(&judge.id, &alice, &bob, Winner::Red, false);
        // Alice (red) lost, but the ruling was overturned: +2.
        let inverted = settled_deal(&judge.id, &alice, &bob, Winner::Blue, true);
        // Alice (red) won, but the ruling was overturned: -2.
        let stolen = settled_deal(&judge.id, &alice, &bob, Winner::Red, true);

        let mut user = User::new("A".into(), "A".into(), "alice".into(), false);
        user.id = alice;
        user.results_settled = vec![won.id.clone(), inverted.id.clone(), stolen.id.clone()];
        ledger.insert_deal(won).unwrap();
        ledger.insert_deal(inverted).unwrap();
        ledger.insert_deal(stolen).unwrap();

        assert_eq!(success(&ledger, &user).unwrap(), 2);
    }

    #[test]
    fn incomplete_deals_contribute_zero() {
        let ledger = MemoryLedger::new();
        let alice = UserId::new();
        let mut deal = DealDocument::new_common(
            alice.clone(),
            "terms".to_string(),
            "2099-01-01T00:00:00.000Z".to_string(),
        );
        deal.completed = false;
        let mut user = User::new("A".into(), "A".into(), "alice".into(), false);
        user.id = alice;
        user.results_settled = vec![deal.id.clone()];
        ledger.insert_deal(deal).unwrap();
        assert_eq!(success(&ledger, &user).unwrap(), 0);
    }

    #[test]
    fn justice_rejects_common_users() {
        let ledger = MemoryLedger::new();
        let user = User::new("A".into(), "A".into(), "alice".into(), false);
        assert!(matches!(
            justice(&ledger, &user),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn justice_ignores_decisions_on_incomplete_deals() {
        let ledger = MemoryLedger::new();
        let mut judge = judge_user();
        let phantom = DealId::new();
        judge
            .judge_profile
            .as_mut()
            .unwrap()
            .decisions
            .push(Decision {
                deal: phantom,
                verdict: Verdict::Red,
                decided_at: chrono::Utc::now(),
            });
        assert_eq!(justice(&ledger, &judge).unwrap(), 0);
    }

    proptest! {
        /// Justice = 2*affirmed - 4*overturned over the decision history.
        #[test]
        fn justice_matches_the_closed_form(blamed in proptest::collection::vec(any::<bool>(), 0..12)) {
            let ledger = MemoryLedger::new();
            let mut judge = judge_user();
            let alice = UserId::new();
            let bob = UserId::new();
            for &b in &blamed {
                let deal = settled_deal(&judge.id, &alice, &bob, Winner::Red, b);
                judge.judge_profile.as_mut().unwrap().decisions.push(Decision {
                    deal: deal.id.clone(),
                    verdict: Verdict::Red,
                    decided_at: chrono::Utc::now(),
                });
                ledger.insert_deal(deal).unwrap();
            }
            let overturned = blamed.iter().filter(|b| **b).count() as i64;
            let affirmed = blamed.len() as i64 - overturned;
            prop_assert_eq!(justice(&ledger, &judge).unwrap(), 2 * affirmed - 4 * overturned);
        }
    }
}
