//! Structural errors raised by the document model itself, independent of
//! any storage or engine concern.

use thiserror::Error;

use crate::deal::DealStage;
use crate::identity::DealId;

/// A deal document violated one of its own structural invariants.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// `final_version` does not select any pact in the document.
    #[error("deal {deal} has no pact for version {version:?}")]
    MissingPact { deal: DealId, version: String },

    /// The append-only stage history is empty or its last record is unusable.
    #[error("deal {deal} has no stage history")]
    EmptyStageHistory { deal: DealId },

    /// A stage transition outside the validated table was attempted.
    #[error("illegal stage transition {from} -> {to}")]
    IllegalTransition { from: DealStage, to: DealStage },

    /// A blame document's blue side does not hold exactly one deal reference.
    #[error("blame document {deal} does not reference a blamed deal")]
    MalformedBlame { deal: DealId },
}
