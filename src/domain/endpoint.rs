//! Remote or local endpoints.

use std::hash::{Hash, Hasher};
use std::net::{SocketAddr, SocketAddrV6};

use serde::Serialize;

use crate::error::CollabError;

/// A named IPv6 endpoint. Two endpoints are equal when their addresses are.
#[derive(Debug, Clone, Serialize)]
pub struct PeerEndPoint {
    name: Option<String>,
    address: SocketAddrV6,
}

impl PeerEndPoint {
    /// Creates an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] if `address` is not IPv6.
    pub fn new(address: SocketAddr, name: Option<String>) -> Result<Self, CollabError> {
        Ok(Self {
            name,
            address: require_v6(address)?,
        })
    }

    /// Creates an endpoint from an address already known to be IPv6.
    #[must_use]
    pub fn from_v6(address: SocketAddrV6, name: Option<String>) -> Self {
        Self { name, address }
    }

    /// Returns the endpoint name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Replaces the endpoint name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Returns the endpoint address.
    #[must_use]
    pub fn address(&self) -> SocketAddrV6 {
        self.address
    }

    /// Replaces the endpoint address.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Validation`] if `address` is not IPv6; the
    /// endpoint is left unchanged.
    pub fn set_address(&mut self, address: SocketAddr) -> Result<(), CollabError> {
        self.address = require_v6(address)?;
        Ok(())
    }
}

fn require_v6(address: SocketAddr) -> Result<SocketAddrV6, CollabError> {
    match address {
        SocketAddr::V6(v6) => Ok(v6),
        SocketAddr::V4(v4) => Err(CollabError::validation(format!(
            "endpoint address {v4} is not IPv6"
        ))),
    }
}

impl PartialEq for PeerEndPoint {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for PeerEndPoint {}

impl Hash for PeerEndPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
