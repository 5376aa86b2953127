//! # Blame Documents
//!
//! A blame document is a deal about a deal: judges who believe a decision
//! was wrong co-sign it, pooling their justice scores. Once the pooled
//! justice reaches the snapshot justice recorded on the blamed deal, the
//! blame activates and the targeted outcome is reversed.
//!
//! Reversal is a toggle, and it cascades: blaming a blame document undoes
//! the reversal it performed, so activation walks the chain of targets,
//! flipping each mark, until it reaches a common deal. The walk keeps a
//! visited set; a chain that loops back on itself is rejected with
//! [`EngineError::BlameCycle`] rather than followed forever.

use std::collections::HashSet;

use tracing::{debug, info};

use pact_core::{
    BlameMark, DealDocument, DealId, DealKind, Decision, Participant, PartyRef, UserId, Verdict,
};

use crate::engine::DealEngine;
use crate::error::EngineError;
use crate::score;

impl DealEngine {
    /// Draft a blame document against `blamed`, opened by `creator`.
    ///
    /// Only judges in good standing may open one: a negative justice score
    /// means the judge's own record is tainted, and a zero score brings no
    /// weight to pool. The creator's justice seeds the document's count.
    pub fn create_blame(
        &self,
        creator: &UserId,
        blamed: &DealId,
        reason: &str,
    ) -> Result<DealId, EngineError> {
        let mut user = self.require_user(creator)?;
        if !user.is_judge {
            return Err(EngineError::AuthorizationDenied(format!(
                "user {creator} is not a judge"
            )));
        }
        let justice = score::justice(self.ledger(), &user)?;
        if justice < 0 {
            return Err(EngineError::AuthorizationDenied(format!(
                "judge {creator} has negative justice ({justice}) and may not open blame"
            )));
        }
        if justice == 0 {
            return Err(EngineError::AuthorizationDenied(format!(
                "judge {creator} has no justice to stake"
            )));
        }
        if reason.is_empty() {
            return Err(EngineError::Validation("reason must not be empty".into()));
        }
        // The target has to exist before anything points at it.
        self.require_deal(blamed)?;

        let doc = DealDocument::new_blame(creator.clone(), blamed.clone(), reason.into(), justice);
        let doc_id = doc.id.clone();
        self.ledger().insert_deal(doc)?;

        user.deal_docs.push(doc_id.clone());
        user.participating.push(doc_id.clone());
        self.ledger().replace_user(user)?;

        info!(blame = %doc_id, blamed = %blamed, creator = %creator, justice, "opened blame document");
        Ok(doc_id)
    }

    /// Co-sign an open blame document, adding the joining judge's justice
    /// to its pooled count.
    pub fn join_blame(&self, judge_id: &UserId, blame_id: &DealId) -> Result<(), EngineError> {
        let mut user = self.require_user(judge_id)?;
        if !user.is_judge {
            return Err(EngineError::AuthorizationDenied(format!(
                "user {judge_id} is not a judge"
            )));
        }
        let mut doc = self.require_deal(blame_id)?;
        if doc.kind != DealKind::Blame {
            return Err(EngineError::Validation(format!(
                "deal {blame_id} is not a blame document"
            )));
        }
        if doc.completed {
            return Err(EngineError::Conflict(format!(
                "blame document {blame_id} is already settled"
            )));
        }
        let party = PartyRef::User(judge_id.clone());
        if doc.judge.contains(&party) {
            return Err(EngineError::Conflict(format!(
                "judge {judge_id} already co-signed blame {blame_id}"
            )));
        }
        let justice = score::justice(self.ledger(), &user)?;
        if justice <= 0 {
            return Err(EngineError::AuthorizationDenied(format!(
                "judge {judge_id} has no justice to stake ({justice})"
            )));
        }

        doc.current_pact_mut()?
            .red
            .push(Participant::accepted(judge_id.clone()));
        doc.judge.push(Participant::accepted(judge_id.clone()));
        doc.justice_count += justice;
        let pooled = doc.justice_count;
        self.ledger().replace_deal(doc)?;

        user.deal_docs.push(blame_id.clone());
        user.participating.push(blame_id.clone());
        if let Some(profile) = user.judge_profile.as_mut() {
            profile.decisions.push(Decision {
                deal: blame_id.clone(),
                verdict: Verdict::Blame,
                decided_at: chrono::Utc::now(),
            });
        }
        self.ledger().replace_user(user)?;

        info!(blame = %blame_id, judge = %judge_id, justice, pooled, "judge co-signed blame");
        Ok(())
    }

    /// Activate a blame document: if its pooled justice has reached the
    /// snapshot justice of the blamed deal, settle the document and reverse
    /// the targeted outcome, cascading through any chain of blame targets.
    pub fn activate_blame(&self, judge_id: &UserId, blame_id: &DealId) -> Result<(), EngineError> {
        let user = self.require_user(judge_id)?;
        if !user.is_judge {
            return Err(EngineError::AuthorizationDenied(format!(
                "user {judge_id} is not a judge"
            )));
        }
        let mut doc = self.require_deal(blame_id)?;
        if doc.kind != DealKind::Blame {
            return Err(EngineError::Validation(format!(
                "deal {blame_id} is not a blame document"
            )));
        }
        if doc.completed {
            return Err(EngineError::Conflict(format!(
                "blame document {blame_id} is already settled"
            )));
        }
        if !doc.judge.contains(&PartyRef::User(judge_id.clone())) {
            return Err(EngineError::AuthorizationDenied(format!(
                "judge {judge_id} did not co-sign blame {blame_id}"
            )));
        }

        let blamed_id = doc.blamed_deal()?;
        let blamed = self.require_deal(&blamed_id)?;
        if blamed.justice_count > doc.justice_count {
            return Err(EngineError::AuthorizationDenied(format!(
                "blame {blame_id} pooled {} justice, target {blamed_id} stands at {}",
                doc.justice_count, blamed.justice_count
            )));
        }

        doc.completed = true;
        doc.blame = Some(BlameMark::No);
        self.ledger().replace_deal(doc)?;
        info!(blame = %blame_id, blamed = %blamed_id, "blame activated, reversing outcome chain");

        self.reverse_chain(blame_id, blamed_id)
    }

    /// Walk the blame chain from `start`, toggling each document's mark.
    ///
    /// A blame document in the chain forwards the walk to its own target
    /// (reversing a reversal un-reverses it); a common deal ends it. Each
    /// toggle is persisted as it happens, so a chain that turns out to be
    /// cyclic leaves the toggles made before detection in place.
    fn reverse_chain(&self, origin: &DealId, start: DealId) -> Result<(), EngineError> {
        let mut visited: HashSet<DealId> = HashSet::from([origin.clone()]);
        let mut current = start;
        loop {
            if !visited.insert(current.clone()) {
                return Err(EngineError::BlameCycle {
                    deal: current.clone(),
                });
            }
            let mut doc = self.require_deal(&current)?;
            let mark = match doc.blame {
                Some(mark) => mark.toggled(),
                None => BlameMark::Yes,
            };
            doc.blame = Some(mark);
            let next = match doc.kind {
                DealKind::Blame => Some(doc.blamed_deal()?),
                DealKind::Common => None,
            };
            self.ledger().replace_deal(doc)?;
            debug!(deal = %current, ?mark, "toggled blame mark");
            match next {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
    }
}
