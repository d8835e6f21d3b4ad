//! Type-safe identifier for applications and objects.
//!
//! [`CollabId`] is a newtype wrapper around [`Uuid`] so that
//! application and object ids cannot be confused with other UUIDs. The nil
//! UUID is the "empty" id, which entity-scoped subscriptions reject.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a published application or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollabId(Uuid);

impl CollabId {
    /// Creates a new random `CollabId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The empty id.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` for the empty id.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a `CollabId` from an existing [`Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CollabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollabId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for CollabId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CollabId> for Uuid {
    fn from(id: CollabId) -> Self {
        id.0
    }
}
