//! DER-encoded X.509 certificate value.

use std::fmt;

use serde::Serialize;

/// A certificate carried as its DER bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wraps DER bytes.
    #[must_use]
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { der: der.into() }
    }

    /// Returns the DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Consumes the certificate, returning its DER bytes.
    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish()
    }
}
