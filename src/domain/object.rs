//! Published objects.

use serde::Serialize;

use super::application::check_entity_data;
use super::{CollabId, PeerScope};
use crate::error::CollabError;

/// A data object published by the local peer or a remote endpoint.
/// Two objects are equal when their ids are.
#[derive(Debug, Clone, Serialize)]
pub struct PeerObject {
    id: CollabId,
    data: Vec<u8>,
    scope: PeerScope,
}

impl PeerObject {
    /// Creates an object.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] if `data` exceeds 16 KiB.
    pub fn new(id: CollabId, data: Vec<u8>, scope: PeerScope) -> Result<Self, CollabError> {
        check_entity_data(&data)?;
        Ok(Self::from_parts(id, data, scope))
    }

    pub(crate) fn from_parts(id: CollabId, data: Vec<u8>, scope: PeerScope) -> Self {
        Self { id, data, scope }
    }

    /// Returns the object id.
    #[must_use]
    pub fn id(&self) -> CollabId {
        self.id
    }

    /// Returns the object payload.
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

    /// Returns the publication scope.
    #[must_use]
    pub fn scope(&self) -> PeerScope {
        self.scope
    }
}

impl PartialEq for PeerObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerObject {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::MAX_ENTITY_DATA;

    #[test]
    fn oversized_object_is_rejected() {
        assert!(PeerObject::new(CollabId::new(), vec![0; MAX_ENTITY_DATA + 1], PeerScope::All).is_err());
    }

    #[test]
    fn equality_by_id() {
        let id = CollabId::new();
        assert_eq!(
            PeerObject::from_parts(id, vec![1], PeerScope::All),
            PeerObject::from_parts(id, vec![2], PeerScope::NearMe)
        );
    }
}
