//! Presence of an endpoint.

use serde::Serialize;

use crate::error::CollabError;

/// Presence status values.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Signed out.
    #[default]
    Offline = 0,
    /// Out to lunch.
    OutToLunch = 1,
    /// Away.
    Away = 2,
    /// Be right back.
    BeRightBack = 3,
    /// Idle.
    Idle = 4,
    /// Busy.
    Busy = 5,
    /// On the phone.
    OnThePhone = 6,
    /// Online.
    Online = 7,
}

impl TryFrom<u32> for PresenceStatus {
    type Error = CollabError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Self::Offline,
            1 => Self::OutToLunch,
            2 => Self::Away,
            3 => Self::BeRightBack,
            4 => Self::Idle,
            5 => Self::Busy,
            6 => Self::OnThePhone,
            7 => Self::Online,
            other => {
                return Err(CollabError::validation(format!(
                    "unknown presence status {other}"
                )));
            }
        })
    }
}

/// Presence status plus free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PeerPresenceInfo {
    /// Status.
    pub status: PresenceStatus,
    /// Descriptive text, e.g. "in a meeting".
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_status_mapping() {
        assert_eq!(PresenceStatus::try_from(7).ok(), Some(PresenceStatus::Online));
        assert_eq!(PresenceStatus::try_from(0).ok(), Some(PresenceStatus::Offline));
        assert!(PresenceStatus::try_from(8).is_err());
    }
}
