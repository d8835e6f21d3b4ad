//! Published applications and publication scope.

use serde::Serialize;

use super::CollabId;
use crate::error::CollabError;
use crate::native::MAX_ENTITY_DATA;

/// Where an application or object is published.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerScope {
    /// Not published.
    None = 0,
    /// Published to people near me.
    NearMe = 1,
    /// Published over the internet.
    Internet = 2,
    /// Published everywhere.
    #[default]
    All = 3,
}

impl PeerScope {
    /// Maps a native publication scope.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] for a value outside the known scopes.
    pub fn from_raw(raw: u32) -> Result<Self, CollabError> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::NearMe),
            2 => Ok(Self::Internet),
            3 => Ok(Self::All),
            other => Err(CollabError::validation(format!(
                "unknown publication scope {other}"
            ))),
        }
    }
}

/// Checks a payload against the entity data limit.
pub(crate) fn check_entity_data(data: &[u8]) -> Result<(), CollabError> {
    if data.len() > MAX_ENTITY_DATA {
        return Err(CollabError::validation(format!(
            "data is {} bytes, the limit is {MAX_ENTITY_DATA}",
            data.len()
        )));
    }
    Ok(())
}

/// An application registered locally or published by a remote endpoint.
/// Two applications are equal when their ids are.
#[derive(Debug, Clone, Serialize)]
pub struct PeerApplication {
    id: CollabId,
    data: Vec<u8>,
    description: Option<String>,
    scope: PeerScope,
}

impl PeerApplication {
    /// Creates an application.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] if `data` exceeds 16 KiB.
    pub fn new(
        id: CollabId,
        data: Vec<u8>,
        description: Option<String>,
        scope: PeerScope,
    ) -> Result<Self, CollabError> {
        check_entity_data(&data)?;
        Ok(Self::from_parts(id, data, description, scope))
    }

    pub(crate) fn from_parts(
        id: CollabId,
        data: Vec<u8>,
        description: Option<String>,
        scope: PeerScope,
    ) -> Self {
        Self {
            id,
            data,
            description,
            scope,
        }
    }

    /// Returns the application id.
    #[must_use]
    pub fn id(&self) -> CollabId {
        self.id
    }

    /// Returns the application payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the payload.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] if `data` exceeds 16 KiB.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<(), CollabError> {
        check_entity_data(&data)?;
        self.data = data;
        Ok(())
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the publication scope.
    #[must_use]
    pub fn scope(&self) -> PeerScope {
        self.scope
    }
}

impl PartialEq for PeerApplication {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerApplication {}
