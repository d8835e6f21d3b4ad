//! Typed change notifications.
//!
//! Every native event record drained from a slot is decoded once into a
//! [`ChangeRecord`]. Slots then narrow it to the notification type their
//! subscribers expect through [`Notification::from_record`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    CollabId, PeerApplication, PeerContact, PeerEndPoint, PeerObject, PeerPresenceInfo,
};
use crate::error::CollabError;
use crate::native::change_type;

/// What happened to the subject of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// The subject was added.
    Added,
    /// The subject was deleted.
    Deleted,
    /// The subject was updated.
    Updated,
}

impl ChangeType {
    /// Maps a native change kind.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] for an unknown value.
    pub fn from_raw(raw: u32) -> Result<Self, CollabError> {
        match raw {
            change_type::ADDED => Ok(Self::Added),
            change_type::DELETED => Ok(Self::Deleted),
            change_type::UPDATED => Ok(Self::Updated),
            other => Err(CollabError::validation(format!(
                "unknown change type {other}"
            ))),
        }
    }

    /// Returns the native change kind.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Added => change_type::ADDED,
            Self::Deleted => change_type::DELETED,
            Self::Updated => change_type::UPDATED,
        }
    }
}

/// An application was added, removed or updated.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationChanged {
    /// Endpoint that published the application.
    pub endpoint: Option<PeerEndPoint>,
    /// Contact that owns the endpoint.
    pub contact: Option<PeerContact>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// The application.
    pub application: PeerApplication,
    /// When the record was decoded.
    pub received_at: DateTime<Utc>,
}

/// An object was added, removed or updated.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectChanged {
    /// Endpoint that published the object.
    pub endpoint: Option<PeerEndPoint>,
    /// Contact that owns the endpoint.
    pub contact: Option<PeerContact>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// The object.
    pub object: PeerObject,
    /// When the record was decoded.
    pub received_at: DateTime<Utc>,
}

/// Presence of an endpoint changed.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceChanged {
    /// Endpoint whose presence changed.
    pub endpoint: Option<PeerEndPoint>,
    /// Contact that owns the endpoint.
    pub contact: Option<PeerContact>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// New presence.
    pub presence: PeerPresenceInfo,
    /// When the record was decoded.
    pub received_at: DateTime<Utc>,
}

/// An endpoint changed its name.
#[derive(Debug, Clone, Serialize)]
pub struct NameChanged {
    /// Endpoint that was renamed.
    pub endpoint: Option<PeerEndPoint>,
    /// Contact that owns the endpoint.
    pub contact: Option<PeerContact>,
    /// Always [`ChangeType::Updated`].
    pub change_type: ChangeType,
    /// The new name.
    pub name: Option<String>,
    /// When the record was decoded.
    pub received_at: DateTime<Utc>,
}

/// A contact entered, left or changed in the watch list.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListChanged {
    /// Endpoint of the contact, when known.
    pub endpoint: Option<PeerEndPoint>,
    /// The contact.
    pub contact: Option<PeerContact>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// When the record was decoded.
    pub received_at: DateTime<Utc>,
}

/// One decoded native event record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ChangeRecord {
    /// See [`ApplicationChanged`].
    Application(ApplicationChanged),
    /// See [`ObjectChanged`].
    Object(ObjectChanged),
    /// See [`PresenceChanged`].
    Presence(PresenceChanged),
    /// See [`NameChanged`].
    Name(NameChanged),
    /// See [`SubscriptionListChanged`].
    SubscriptionList(SubscriptionListChanged),
}

impl ChangeRecord {
    /// Returns the contact associated with the record.
    #[must_use]
    pub fn contact(&self) -> Option<&PeerContact> {
        match self {
            Self::Application(e) => e.contact.as_ref(),
            Self::Object(e) => e.contact.as_ref(),
            Self::Presence(e) => e.contact.as_ref(),
            Self::Name(e) => e.contact.as_ref(),
            Self::SubscriptionList(e) => e.contact.as_ref(),
        }
    }

    /// Returns the endpoint associated with the record.
    #[must_use]
    pub fn endpoint(&self) -> Option<&PeerEndPoint> {
        match self {
            Self::Application(e) => e.endpoint.as_ref(),
            Self::Object(e) => e.endpoint.as_ref(),
            Self::Presence(e) => e.endpoint.as_ref(),
            Self::Name(e) => e.endpoint.as_ref(),
            Self::SubscriptionList(e) => e.endpoint.as_ref(),
        }
    }

    /// Returns the id of the application or object the record is about.
    #[must_use]
    pub fn subject_id(&self) -> Option<CollabId> {
        match self {
            Self::Application(e) => Some(e.application.id()),
            Self::Object(e) => Some(e.object.id()),
            Self::Presence(_) | Self::Name(_) | Self::SubscriptionList(_) => None,
        }
    }

    /// Returns the kind of change.
    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Application(e) => e.change_type,
            Self::Object(e) => e.change_type,
            Self::Presence(e) => e.change_type,
            Self::Name(e) => e.change_type,
            Self::SubscriptionList(e) => e.change_type,
        }
    }

    /// Returns when the record was decoded.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            Self::Application(e) => e.received_at,
            Self::Object(e) => e.received_at,
            Self::Presence(e) => e.received_at,
            Self::Name(e) => e.received_at,
            Self::SubscriptionList(e) => e.received_at,
        }
    }

    /// Returns the record kind as a static string slice.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Application(_) => "application",
            Self::Object(_) => "object",
            Self::Presence(_) => "presence",
            Self::Name(_) => "name",
            Self::SubscriptionList(_) => "subscription_list",
        }
    }
}

/// A notification type that can be narrowed out of a [`ChangeRecord`].
pub trait Notification: Clone + Send + Sync + 'static {
    /// Returns the notification if `record` carries this kind.
    fn from_record(record: ChangeRecord) -> Option<Self>;
}

macro_rules! notification {
    ($ty:ident, $variant:ident) => {
        impl Notification for $ty {
            fn from_record(record: ChangeRecord) -> Option<Self> {
                match record {
                    ChangeRecord::$variant(event) => Some(event),
                    _ => None,
                }
            }
        }

        impl From<$ty> for ChangeRecord {
            fn from(event: $ty) -> Self {
                Self::$variant(event)
            }
        }
    };
}

notification!(ApplicationChanged, Application);
notification!(ObjectChanged, Object);
notification!(PresenceChanged, Presence);
notification!(NameChanged, Name);
notification!(SubscriptionListChanged, SubscriptionList);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PeerScope, PresenceStatus};

    fn presence() -> ChangeRecord {
        PresenceChanged {
            endpoint: None,
            contact: None,
            change_type: ChangeType::Updated,
            presence: PeerPresenceInfo {
                status: PresenceStatus::Busy,
                description: Some("in a meeting".into()),
            },
            received_at: Utc::now(),
        }
        .into()
    }

    #[test]
    fn change_type_raw_mapping() {
        for kind in [ChangeType::Added, ChangeType::Deleted, ChangeType::Updated] {
            assert_eq!(ChangeType::from_raw(kind.to_raw()).ok(), Some(kind));
        }
        assert!(ChangeType::from_raw(3).is_err());
    }

    #[test]
    fn narrowing_picks_matching_kind_only() {
        assert!(PresenceChanged::from_record(presence()).is_some());
        assert!(NameChanged::from_record(presence()).is_none());
    }

    #[test]
    fn subject_id_of_application_record() {
        let id = CollabId::new();
        let record: ChangeRecord = ApplicationChanged {
            endpoint: None,
            contact: None,
            change_type: ChangeType::Added,
            application: PeerApplication::from_parts(id, Vec::new(), None, PeerScope::All),
            received_at: Utc::now(),
        }
        .into();
        assert_eq!(record.subject_id(), Some(id));
        assert_eq!(record.kind_str(), "application");
        assert_eq!(presence().subject_id(), None);
    }

    #[test]
    fn record_serializes_with_tag() {
        let Ok(json) = serde_json::to_string(&presence()) else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"record\":\"presence\""));
        assert!(json.contains("busy"));
    }
}
