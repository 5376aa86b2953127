//! # Deal Lifecycle Engine
//!
//! State machine driver over [`DealDocument`]: drafting, offers,
//! acceptance, judge assignment, decision, and timeout resolution. Every
//! operation is a stateless read-modify-write against the ledger; the
//! revision token on each record turns lost races into explicit
//! [`EngineError::Conflict`]s instead of silent overwrites.
//!
//! Judge claiming is first-judge-wins: the deal is offered to every
//! judge-capable user once all participants accept, and the first
//! `judge_accept` in stage `ACCEPTED_BY_USERS` takes it. A losing judge's
//! call is not an error — it just drops the stale proposition.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use pact_core::{
    BlameMark, BridgeError, DealDocument, DealId, DealScheduler, DealStage, Decision, Participant,
    PartyRef, SideKind, TimeoutSink, User, UserId, Verdict, Winner,
};
use pact_ledger::Ledger;

use crate::error::EngineError;
use crate::score;

/// The deal lifecycle engine.
///
/// Cheap to share behind an [`Arc`]; all state lives in the ledger. The
/// scheduler is bound once at bootstrap (`bind_scheduler`) after the
/// watcher — which needs the engine as its timeout sink — has been built.
pub struct DealEngine {
    ledger: Arc<dyn Ledger>,
    scheduler: OnceLock<Arc<dyn DealScheduler>>,
}

impl DealEngine {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            scheduler: OnceLock::new(),
        }
    }

    /// Bind the timeout scheduler. Later calls are ignored.
    pub fn bind_scheduler(&self, scheduler: Arc<dyn DealScheduler>) {
        let _ = self.scheduler.set(scheduler);
    }

    fn scheduler(&self) -> Result<&Arc<dyn DealScheduler>, EngineError> {
        self.scheduler
            .get()
            .ok_or_else(|| EngineError::Scheduler(BridgeError::new("no timeout scheduler bound")))
    }

    // -- lookups ----------------------------------------------------------

    pub(crate) fn require_user(&self, id: &UserId) -> Result<User, EngineError> {
        self.ledger.user(id)?.ok_or_else(|| EngineError::NotFound {
            what: "user",
            id: id.to_string(),
        })
    }

    pub(crate) fn require_deal(&self, id: &DealId) -> Result<DealDocument, EngineError> {
        self.ledger.deal(id)?.ok_or_else(|| EngineError::NotFound {
            what: "deal",
            id: id.to_string(),
        })
    }

    // -- users ------------------------------------------------------------

    /// Register a user. The full user CRUD service lives elsewhere; this is
    /// the minimal seeding operation the engine's own flows require.
    pub fn register_user(
        &self,
        name: &str,
        surname: &str,
        handle: &str,
        is_judge: bool,
    ) -> Result<UserId, EngineError> {
        if handle.is_empty() {
            return Err(EngineError::Validation("handle must not be empty".into()));
        }
        let user = User::new(
            name.to_string(),
            surname.to_string(),
            handle.to_string(),
            is_judge,
        );
        let id = user.id.clone();
        self.ledger.insert_user(user)?;
        info!(user = %id, handle, is_judge, "registered user");
        Ok(id)
    }

    pub fn user(&self, id: &UserId) -> Result<User, EngineError> {
        self.require_user(id)
    }

    /// The user's success score, recomputed from their settled deals.
    pub fn success_score(&self, id: &UserId) -> Result<i64, EngineError> {
        let user = self.require_user(id)?;
        score::success(self.ledger.as_ref(), &user)
    }

    /// The judge's justice score, recomputed from their decision history.
    pub fn justice_score(&self, id: &UserId) -> Result<i64, EngineError> {
        let user = self.require_user(id)?;
        score::justice(self.ledger.as_ref(), &user)
    }

    // -- lifecycle --------------------------------------------------------

    /// Draft a new deal: the creator sits alone on the red side, already
    /// accepted; the deal lands in their `accepted` bucket.
    pub fn create_deal(
        &self,
        creator: &UserId,
        content: &str,
        deadline: &str,
    ) -> Result<DealId, EngineError> {
        if content.is_empty() {
            return Err(EngineError::Validation("content must not be empty".into()));
        }
        if deadline.is_empty() {
            return Err(EngineError::Validation("deadline must not be empty".into()));
        }
        let mut user = self.require_user(creator)?;

        let deal = DealDocument::new_common(creator.clone(), content.into(), deadline.into());
        let deal_id = deal.id.clone();
        self.ledger.insert_deal(deal)?;

        user.deal_docs.push(deal_id.clone());
        user.accepted.push(deal_id.clone());
        self.ledger.replace_user(user)?;

        info!(deal = %deal_id, creator = %creator, "created deal document");
        Ok(deal_id)
    }

    pub fn deal(&self, id: &DealId) -> Result<DealDocument, EngineError> {
        self.require_deal(id)
    }

    /// Offer a deal to `handle` — as a blue-side counterparty, or, with
    /// `to_judge`, as a proposition to arbitrate.
    ///
    /// Idempotent: if the target already holds the deal, the call silently
    /// succeeds so the offering party learns nothing about the target's
    /// records.
    pub fn offer_deal(
        &self,
        deal_id: &DealId,
        handle: &str,
        to_judge: bool,
    ) -> Result<(), EngineError> {
        let mut deal = self.require_deal(deal_id)?;
        let mut target =
            self.ledger
                .user_by_handle(handle)?
                .ok_or_else(|| EngineError::NotFound {
                    what: "user",
                    id: handle.to_string(),
                })?;

        if to_judge {
            if !target.is_judge {
                return Err(EngineError::AuthorizationDenied(format!(
                    "user {handle:?} is not a judge"
                )));
            }
            let Some(profile) = target.judge_profile.as_mut() else {
                return Err(EngineError::Validation(format!(
                    "judge {handle:?} has no judge profile"
                )));
            };
            if !profile.propose(deal_id) {
                // Already proposed or claimed; swallow.
                return Ok(());
            }
            let target_id = target.id.clone();
            self.ledger.replace_user(target)?;
            deal.judge.push(Participant::pending(target_id));
            self.ledger.replace_deal(deal)?;
        } else {
            if !target.record_offer(deal_id) {
                // Already offered or accepted; swallow.
                return Ok(());
            }
            let target_id = target.id.clone();
            self.ledger.replace_user(target)?;
            deal.current_pact_mut()?
                .blue
                .push(Participant::pending(target_id));
            self.ledger.replace_deal(deal)?;
        }
        debug!(deal = %deal_id, handle, to_judge, "offered deal");
        Ok(())
    }

    /// Accept a deal for `user` on `side`. When the last outstanding red or
    /// blue participant accepts, the deal advances to `ACCEPTED_BY_USERS`
    /// and is offered to every judge — the timer starts only once a judge
    /// claims it.
    pub fn accept_deal(
        &self,
        user_id: &UserId,
        deal_id: &DealId,
        side: SideKind,
    ) -> Result<(), EngineError> {
        let mut deal = self.require_deal(deal_id)?;

        if side == SideKind::Judge {
            return self.accept_judge_side(deal, user_id);
        }

        let mut user = self.require_user(user_id)?;
        {
            let pact = deal.current_pact_mut()?;
            let side_list = match side {
                SideKind::Red => &mut pact.red,
                SideKind::Blue => &mut pact.blue,
                SideKind::Judge => unreachable!("handled above"),
            };
            let party = PartyRef::User(user_id.clone());
            let participant =
                side_list
                    .participant_mut(&party)
                    .ok_or_else(|| EngineError::NotFound {
                        what: "participant",
                        id: format!("{user_id} on {side} side of {deal_id}"),
                    })?;
            if participant.accepted {
                return Err(EngineError::Conflict(format!(
                    "user {user_id} already accepted deal {deal_id}"
                )));
            }
            participant.accepted = true;
        }

        if !user.accept_offer(deal_id) {
            return Err(EngineError::Conflict(format!(
                "deal {deal_id} was never offered to user {user_id}"
            )));
        }
        self.ledger.replace_user(user)?;

        // Full-acceptance trigger: runs only out of Initial; every red and
        // blue participant (at least one each) must have accepted.
        let everyone_in = deal.stage()? == DealStage::Initial && deal.accepted_by_users()?;
        if everyone_in {
            deal.push_stage(DealStage::AcceptedByUsers)?;
        }
        self.ledger.replace_deal(deal)?;

        if everyone_in {
            info!(deal = %deal_id, "all participants accepted, offering to judges");
            self.offer_judges(deal_id)?;
        }
        Ok(())
    }

    fn accept_judge_side(
        &self,
        mut deal: DealDocument,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        let deal_id = deal.id.clone();
        let party = PartyRef::User(user_id.clone());
        let participant =
            deal.judge
                .participant_mut(&party)
                .ok_or_else(|| EngineError::NotFound {
                    what: "participant",
                    id: format!("{user_id} on JUDGE side of {deal_id}"),
                })?;
        if participant.accepted {
            return Err(EngineError::Conflict(format!(
                "judge {user_id} already accepted deal {deal_id}"
            )));
        }
        participant.accepted = true;
        self.ledger.replace_deal(deal)?;
        Ok(())
    }

    /// Propose the deal to every judge-capable user not already holding it.
    pub fn offer_judges(&self, deal_id: &DealId) -> Result<(), EngineError> {
        for mut judge in self.ledger.judges()? {
            let judge_id = judge.id.clone();
            let Some(profile) = judge.judge_profile.as_mut() else {
                return Err(EngineError::Validation(format!(
                    "judge {judge_id} has no judge profile"
                )));
            };
            if profile.propose(deal_id) {
                self.ledger.replace_user(judge)?;
                debug!(deal = %deal_id, judge = %judge_id, "proposed deal to judge");
            }
        }
        Ok(())
    }

    /// A judge claims a deal that every participant accepted.
    ///
    /// First judge wins: if the deal is past `ACCEPTED_BY_USERS`, another
    /// judge already claimed it and this call just drops the stale
    /// proposition — deliberately not an error. On success the deal moves
    /// to `ALL_ACCEPTED`, is handed to the timeout watcher, and every
    /// participant's record flips from `accepted` to `participating`.
    pub fn judge_accept(&self, judge_id: &UserId, deal_id: &DealId) -> Result<(), EngineError> {
        let mut judge = self.require_user(judge_id)?;
        if !judge.is_judge {
            return Err(EngineError::AuthorizationDenied(format!(
                "user {judge_id} is not a judge"
            )));
        }
        let mut deal = self.require_deal(deal_id)?;

        if deal.stage()? != DealStage::AcceptedByUsers {
            // Already claimed (or never ready). Drop the stale proposition.
            if let Some(profile) = judge.judge_profile.as_mut() {
                profile.drop_proposition(deal_id);
                self.ledger.replace_user(judge)?;
            }
            debug!(deal = %deal_id, judge = %judge_id, "deal already claimed, dropped proposition");
            return Ok(());
        }

        let Some(profile) = judge.judge_profile.as_mut() else {
            return Err(EngineError::Validation(format!(
                "judge {judge_id} has no judge profile"
            )));
        };
        if !profile.claim(deal_id) {
            return Err(EngineError::Conflict(format!(
                "deal {deal_id} is not among judge {judge_id} propositions"
            )));
        }
        self.ledger.replace_user(judge)?;

        deal.judge.participants = vec![Participant::accepted(judge_id.clone())];
        deal.push_stage(DealStage::AllAccepted)?;
        let deadline = deal
            .current_pact()?
            .deadline
            .clone()
            .ok_or_else(|| EngineError::Validation(format!("deal {deal_id} has no deadline")))?;
        let participants: Vec<UserId> = {
            let pact = deal.current_pact()?;
            pact.blue
                .user_ids()
                .chain(pact.red.user_ids())
                .cloned()
                .collect()
        };
        self.ledger.replace_deal(deal)?;

        self.scheduler()?
            .hold_and_watch(deal_id.clone(), &deadline)
            .map_err(EngineError::Scheduler)?;
        info!(deal = %deal_id, judge = %judge_id, %deadline, "judge claimed deal, watching deadline");

        // Tell every participant the deal went live.
        for user_id in participants {
            let mut user = self.require_user(&user_id)?;
            if !user.start_participating(deal_id) {
                return Err(EngineError::Conflict(format!(
                    "user {user_id} never accepted deal {deal_id}"
                )));
            }
            self.ledger.replace_user(user)?;
        }
        Ok(())
    }

    /// The claiming judge rules on the deal before its deadline.
    ///
    /// Snapshots the judge's justice onto the document so later blame
    /// activity against the judge does not retroactively change this
    /// deal's blame threshold.
    pub fn judge_decide(
        &self,
        judge_id: &UserId,
        deal_id: &DealId,
        winner: Winner,
    ) -> Result<(), EngineError> {
        let mut deal = self.require_deal(deal_id)?;
        let judge = self.require_user(judge_id)?;
        let participates = judge
            .judge_profile
            .as_ref()
            .is_some_and(|p| p.participating.contains(deal_id));
        if !participates {
            return Err(EngineError::Conflict(format!(
                "judge {judge_id} does not participate in deal {deal_id}"
            )));
        }
        if deal.completed {
            return Err(EngineError::Conflict(format!(
                "deal {deal_id} is already completed, the decision stands"
            )));
        }

        // Justice at decision time, excluding the decision being made.
        let snapshot = score::justice(self.ledger.as_ref(), &judge)?;

        deal.push_stage(DealStage::WinnerSet)?;
        deal.winner = Some(winner);
        deal.blame = Some(BlameMark::No);
        deal.completed = true;
        deal.justice_count = snapshot;
        self.ledger.replace_deal(deal)?;

        let mut judge = judge;
        if let Some(profile) = judge.judge_profile.as_mut() {
            profile.decisions.push(Decision {
                deal: deal_id.clone(),
                verdict: Verdict::from(winner),
                decided_at: chrono::Utc::now(),
            });
            profile.conclude(deal_id);
        }
        self.ledger.replace_user(judge)?;

        info!(deal = %deal_id, judge = %judge_id, winner = %winner, justice = snapshot, "winner set");
        Ok(())
    }

    /// Resolve a deal whose deadline fired. Invoked only by the timeout
    /// watcher.
    ///
    /// If the judge decided in time, participants are notified of won/lost;
    /// otherwise the deal expires undecided. Either way every participant
    /// moves from `participating` to `results_settled` and the document
    /// reaches its terminal `TIME_OUT` stage.
    pub fn deal_timeout(&self, deal_id: &DealId) -> Result<(), EngineError> {
        let mut deal = self.require_deal(deal_id)?;
        let stage = deal.stage()?;
        let decided = stage == DealStage::WinnerSet;

        let (red, blue): (Vec<UserId>, Vec<UserId>) = {
            let pact = deal.current_pact()?;
            (
                pact.red.user_ids().cloned().collect(),
                pact.blue.user_ids().cloned().collect(),
            )
        };

        if decided && deal.winner.is_none() {
            return Err(EngineError::Validation(format!(
                "deal {deal_id} is decided but has no winner"
            )));
        }
        for user_id in red.iter().chain(blue.iter()) {
            self.settle_participant(user_id, deal_id)?;
        }
        match deal.winner {
            Some(winner) => info!(deal = %deal_id, %winner, "deal timed out with a winner"),
            None => info!(deal = %deal_id, "deal expired, judge never decided"),
        }

        deal.push_stage(DealStage::TimedOut)?;
        self.ledger.replace_deal(deal)?;
        Ok(())
    }

    fn settle_participant(&self, user_id: &UserId, deal_id: &DealId) -> Result<(), EngineError> {
        let mut user = self.require_user(user_id)?;
        if !user.settle_result(deal_id) {
            warn!(user = %user_id, deal = %deal_id, "participant record out of step at settlement");
            return Err(EngineError::Conflict(format!(
                "user {user_id} does not participate in deal {deal_id}"
            )));
        }
        self.ledger.replace_user(user)?;
        Ok(())
    }

    pub(crate) fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }
}

impl TimeoutSink for DealEngine {
    fn deal_timeout(&self, deal: DealId) -> Result<(), BridgeError> {
        DealEngine::deal_timeout(self, &deal).map_err(|e| BridgeError::new(e.to_string()))
    }
}
