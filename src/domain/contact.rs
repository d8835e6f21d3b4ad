//! Contacts and peer names.

use std::fmt;

use serde::Serialize;

use super::Certificate;
use crate::error::CollabError;

/// Name a peer publishes itself under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PeerName(String);

impl PeerName {
    /// Creates a peer name.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] for an empty or blank name.
    pub fn new(name: impl Into<String>) -> Result<Self, CollabError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CollabError::validation("peer name must not be empty"));
        }
        Ok(Self(name))
    }

    /// Wraps a name read from a native record without validation.
    pub(crate) fn from_native(name: String) -> Self {
        Self(name)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a contact may subscribe to the local peer.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    /// Subscription refused.
    #[default]
    Blocked = 0,
    /// Subscription permitted.
    Allowed = 1,
}

impl SubscriptionType {
    /// Maps a native permission value. Anything but `1` is treated as blocked.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        if raw == Self::Allowed as u32 {
            Self::Allowed
        } else {
            Self::Blocked
        }
    }
}

/// A contact in the local contact store, or the local identity itself.
///
/// Two contacts are equal when their peer names are equal.
#[derive(Debug, Clone, Serialize)]
pub struct PeerContact {
    /// Peer name the contact publishes under.
    pub peer_name: Option<PeerName>,
    /// Nickname.
    pub nickname: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// E-mail address.
    pub email_address: Option<String>,
    /// Whether the local peer watches this contact.
    pub is_subscribed: bool,
    /// Whether the contact may watch the local peer.
    pub subscribe_allowed: SubscriptionType,
    /// Certificate the contact signs with.
    pub credentials: Option<Certificate>,
}

impl PeerContact {
    /// Creates a contact with only a peer name set.
    #[must_use]
    pub fn new(peer_name: PeerName) -> Self {
        Self {
            peer_name: Some(peer_name),
            nickname: None,
            display_name: None,
            email_address: None,
            is_subscribed: false,
            subscribe_allowed: SubscriptionType::Blocked,
            credentials: None,
        }
    }
}

impl PartialEq for PeerContact {
    fn eq(&self, other: &Self) -> bool {
        self.peer_name == other.peer_name
    }
}

impl Eq for PeerContact {}
