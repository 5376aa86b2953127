//! # Deal Document Model
//!
//! The negotiation unit of the Pact Stack: a [`DealDocument`] carries an
//! ordered list of [`Pact`] versions (amendments), a pointer selecting the
//! active one, an append-only stage history, and the outcome fields set by
//! arbitration (winner, blame mark, justice snapshot).
//!
//! ## Design Choice: Validated Enum over Typestate
//!
//! [`DealStage`] is a validated enum (runtime-checked transition table)
//! rather than a typestate. Deal documents are stored whole in the ledger
//! and re-read on every operation, so the stage is never known at compile
//! time; a validated enum serializes directly via serde and rejects illegal
//! transitions with [`DocumentError::IllegalTransition`].
//!
//! ## Transition Graph
//!
//! ```text
//! Initial ──all participants accepted──▶ AcceptedByUsers
//!                                             │
//!                                      judge accepts
//!                                             │
//!                                             ▼
//!                                        AllAccepted
//!                                             │
//!                              ┌──────────────┤
//!                              │              │
//!                       judge decides    deadline fires
//!                              │         (no decision)
//!                              ▼              │
//!                          WinnerSet          │
//!                              │              │
//!                       deadline fires        │
//!                              │              │
//!                              ▼              ▼
//!                              TimedOut (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::identity::{DealId, PartyRef, UserId};

// ---------------------------------------------------------------------------
// Stage machine
// ---------------------------------------------------------------------------

/// The lifecycle stage of a deal document.
///
/// The stored representation is the append-only [`StageRecord`] history;
/// the current stage is the last record. [`DealDocument::push_stage`] is
/// the only way to advance it, and it consults [`valid_transitions`]
/// (DealStage::valid_transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStage {
    /// Drafted; offers outstanding.
    Initial,
    /// Every red and blue participant has accepted.
    AcceptedByUsers,
    /// A judge claimed the deal; the timeout clock is running.
    AllAccepted,
    /// The judge decided before the deadline.
    WinnerSet,
    /// The deadline fired. Terminal stage.
    TimedOut,
}

impl DealStage {
    /// The canonical string name of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::AcceptedByUsers => "ACCEPTED_BY_USERS",
            Self::AllAccepted => "ALL_ACCEPTED",
            Self::WinnerSet => "WINNER_SET",
            Self::TimedOut => "TIME_OUT",
        }
    }

    /// Whether this stage is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Valid target stages from this stage.
    ///
    /// `AllAccepted -> TimedOut` covers the judge-never-decided (expired)
    /// path; `WinnerSet -> TimedOut` the decided one.
    pub fn valid_transitions(&self) -> &'static [DealStage] {
        match self {
            Self::Initial => &[Self::AcceptedByUsers],
            Self::AcceptedByUsers => &[Self::AllAccepted],
            Self::AllAccepted => &[Self::WinnerSet, Self::TimedOut],
            Self::WinnerSet => &[Self::TimedOut],
            Self::TimedOut => &[],
        }
    }
}

impl std::fmt::Display for DealStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the append-only stage audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: DealStage,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Outcome vocabulary
// ---------------------------------------------------------------------------

/// The kind of a deal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealKind {
    /// An ordinary two-sided negotiation.
    Common,
    /// A reversal document pointing at an earlier deal.
    Blame,
}

impl DealKind {
    /// The canonical string identifier for serialization and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "COMMON",
            Self::Blame => "BLAME",
        }
    }
}

impl std::fmt::Display for DealKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The winning side of a decided deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Red,
    Blue,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a judge's recorded decision says.
///
/// `Blame` is recorded when a judge co-signs a blame document rather than
/// ruling on a common deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Red,
    Blue,
    Blame,
}

impl From<Winner> for Verdict {
    fn from(w: Winner) -> Self {
        match w {
            Winner::Red => Self::Red,
            Winner::Blue => Self::Blue,
        }
    }
}

/// Whether a completed deal's outcome currently stands reversed.
///
/// Stored as an explicit two-value mark (the unset case is `Option::None`)
/// so a never-decided deal is distinguishable from an affirmed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlameMark {
    Yes,
    No,
}

impl BlameMark {
    /// The opposite mark. Reversal is a binary flip.
    pub fn toggled(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

// ---------------------------------------------------------------------------
// Sides, participants, pacts
// ---------------------------------------------------------------------------

/// A role within a deal document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideKind {
    Red,
    Blue,
    Judge,
}

impl std::fmt::Display for SideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Red => "RED",
            Self::Blue => "BLUE",
            Self::Judge => "JUDGE",
        };
        write!(f, "{s}")
    }
}

/// A party on a side plus its acceptance flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub party: PartyRef,
    pub accepted: bool,
}

impl Participant {
    pub fn accepted(party: impl Into<PartyRef>) -> Self {
        Self {
            party: party.into(),
            accepted: true,
        }
    }

    pub fn pending(party: impl Into<PartyRef>) -> Self {
        Self {
            party: party.into(),
            accepted: false,
        }
    }
}

/// A typed list of participants holding one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Side {
    pub kind: SideKind,
    pub participants: Vec<Participant>,
}

impl Side {
    /// An empty side of the given kind.
    pub fn empty(kind: SideKind) -> Self {
        Self {
            kind,
            participants: Vec::new(),
        }
    }

    pub fn push(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub fn contains(&self, party: &PartyRef) -> bool {
        self.participants.iter().any(|p| &p.party == party)
    }

    pub fn participant_mut(&mut self, party: &PartyRef) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.party == party)
    }

    /// Whether the side is non-empty and every participant accepted.
    pub fn all_accepted(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.accepted)
    }

    /// User ids of every participant on this side, skipping deal references.
    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.participants.iter().filter_map(|p| p.party.as_user())
    }
}

/// The label of one pact version within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PactVersion(String);

impl PactVersion {
    /// The version every document starts with.
    pub fn initial() -> Self {
        Self("initial(#1)".to_string())
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PactVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One version of the negotiated content.
///
/// The deadline travels as an RFC 3339 string: it is caller input, validated
/// only when the timeout watcher parses it. Blame documents carry none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pact {
    pub content: String,
    pub deadline: Option<String>,
    pub version: PactVersion,
    pub red: Side,
    pub blue: Side,
}

// ---------------------------------------------------------------------------
// Deal document
// ---------------------------------------------------------------------------

/// The negotiation unit: pact versions, stage history, and outcome.
///
/// Documents are never deleted; the stage history is an immutable audit log
/// even after completion. `revision` is the optimistic-concurrency token
/// every whole-document replace must present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealDocument {
    pub id: DealId,
    pub kind: DealKind,
    pub pacts: Vec<Pact>,
    pub final_version: PactVersion,
    pub judge: Side,
    pub stages: Vec<StageRecord>,
    pub winner: Option<Winner>,
    pub blame: Option<BlameMark>,
    pub completed: bool,
    /// Justice of the deciding judge, snapshotted at decision time. For a
    /// blame document, the accumulated justice of its co-signers.
    pub justice_count: i64,
    pub revision: u64,
}

impl DealDocument {
    /// A freshly drafted common deal: the creator alone on red, already
    /// accepted; blue empty pending offers.
    pub fn new_common(creator: UserId, content: String, deadline: String) -> Self {
        let version = PactVersion::initial();
        let pact = Pact {
            content,
            deadline: Some(deadline),
            version: version.clone(),
            red: Side {
                kind: SideKind::Red,
                participants: vec![Participant::accepted(creator)],
            },
            blue: Side::empty(SideKind::Blue),
        };
        Self {
            id: DealId::new(),
            kind: DealKind::Common,
            pacts: vec![pact],
            final_version: version,
            judge: Side::empty(SideKind::Judge),
            stages: vec![StageRecord {
                stage: DealStage::Initial,
                at: Utc::now(),
            }],
            winner: None,
            blame: None,
            completed: false,
            justice_count: 0,
            revision: 0,
        }
    }

    /// A freshly drafted blame document: the creating judge on red and on
    /// the judge side, the blamed deal as the sole (auto-accepted) blue
    /// participant, and the creator's justice as the opening count.
    pub fn new_blame(creator: UserId, blamed: DealId, reason: String, justice: i64) -> Self {
        let version = PactVersion::initial();
        let pact = Pact {
            content: reason,
            deadline: None,
            version: version.clone(),
            red: Side {
                kind: SideKind::Red,
                participants: vec![Participant::accepted(creator.clone())],
            },
            blue: Side {
                kind: SideKind::Blue,
                participants: vec![Participant::accepted(blamed)],
            },
        };
        Self {
            id: DealId::new(),
            kind: DealKind::Blame,
            pacts: vec![pact],
            final_version: version,
            judge: Side {
                kind: SideKind::Judge,
                participants: vec![Participant::accepted(creator)],
            },
            stages: vec![StageRecord {
                stage: DealStage::Initial,
                at: Utc::now(),
            }],
            winner: None,
            blame: None,
            completed: false,
            justice_count: justice,
            revision: 0,
        }
    }

    /// The pact selected by `final_version`.
    pub fn current_pact(&self) -> Result<&Pact, DocumentError> {
        self.pacts
            .iter()
            .find(|p| p.version == self.final_version)
            .ok_or_else(|| DocumentError::MissingPact {
                deal: self.id.clone(),
                version: self.final_version.to_string(),
            })
    }

    /// Mutable access to the pact selected by `final_version`.
    pub fn current_pact_mut(&mut self) -> Result<&mut Pact, DocumentError> {
        let version = self.final_version.clone();
        let id = self.id.clone();
        self.pacts
            .iter_mut()
            .find(|p| p.version == version)
            .ok_or(DocumentError::MissingPact {
                deal: id,
                version: version.to_string(),
            })
    }

    /// The current stage: the last record of the audit trail.
    pub fn stage(&self) -> Result<DealStage, DocumentError> {
        self.stages
            .last()
            .map(|r| r.stage)
            .ok_or_else(|| DocumentError::EmptyStageHistory {
                deal: self.id.clone(),
            })
    }

    /// Append a stage record, rejecting transitions outside the table.
    pub fn push_stage(&mut self, stage: DealStage) -> Result<(), DocumentError> {
        let from = self.stage()?;
        if !from.valid_transitions().contains(&stage) {
            return Err(DocumentError::IllegalTransition { from, to: stage });
        }
        self.stages.push(StageRecord {
            stage,
            at: Utc::now(),
        });
        Ok(())
    }

    /// The deal this blame document points at (its sole blue participant).
    pub fn blamed_deal(&self) -> Result<DealId, DocumentError> {
        let malformed = DocumentError::MalformedBlame {
            deal: self.id.clone(),
        };
        if self.kind != DealKind::Blame {
            return Err(malformed);
        }
        let pact = self.current_pact()?;
        match pact.blue.participants.as_slice() {
            [only] => only.party.as_deal().cloned().ok_or(malformed),
            _ => Err(malformed),
        }
    }

    /// Whether every red and blue participant accepted (at least one each).
    pub fn accepted_by_users(&self) -> Result<bool, DocumentError> {
        let pact = self.current_pact()?;
        Ok(pact.red.all_accepted() && pact.blue.all_accepted())
    }
}
