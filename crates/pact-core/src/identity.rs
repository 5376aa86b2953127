//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the Pact Stack.
//! Each identifier is a distinct type — you cannot pass a [`UserId`] where
//! a [`DealId`] is expected. All are UUID-backed and valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a registered user (participant or judge).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new random user identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a user identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

/// A unique identifier for a deal document (common or blame).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(Uuid);

impl DealId {
    /// Create a new random deal identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a deal identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DealId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DealId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deal:{}", self.0)
    }
}

impl std::str::FromStr for DealId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

/// A unique identifier for a timeout queue entry.
///
/// Distinct from [`DealId`]: one deal could in principle be enqueued more
/// than once, and the watcher's stale-fire check compares entry identity,
/// not deal identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new random entry identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entry identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

/// A reference held by a side participant.
///
/// Common deals put users on both sides. A blame document's blue side holds
/// exactly one synthetic participant: the deal being blamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyRef {
    /// A registered user.
    User(UserId),
    /// A prior deal document (blame target).
    Deal(DealId),
}

impl PartyRef {
    /// The user id, if this reference names a user.
    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Deal(_) => None,
        }
    }

    /// The deal id, if this reference names a deal.
    pub fn as_deal(&self) -> Option<&DealId> {
        match self {
            Self::Deal(id) => Some(id),
            Self::User(_) => None,
        }
    }
}

impl std::fmt::Display for PartyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Deal(id) => write!(f, "{id}"),
        }
    }
}

impl From<UserId> for PartyRef {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<DealId> for PartyRef {
    fn from(id: DealId) -> Self {
        Self::Deal(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_per_construction() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(DealId::new(), DealId::new());
    }

    #[test]
    fn display_carries_kind_prefix() {
        let id = DealId::new();
        assert!(id.to_string().starts_with("deal:"));
        let id = UserId::new();
        assert!(id.to_string().starts_with("user:"));
    }

    #[test]
    fn party_ref_projections() {
        let user = UserId::new();
        let r = PartyRef::from(user.clone());
        assert_eq!(r.as_user(), Some(&user));
        assert_eq!(r.as_deal(), None);
    }

    #[test]
    fn round_trips_through_serde() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
