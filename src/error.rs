//! Bridge error types with stable numeric codes.
//!
//! [`CollabError`] is the central error type for the crate. Validation
//! problems are detected before any native call is made; platform errors
//! carry the OS error code returned by the failing native operation,
//! unchanged.

use crate::native::HResult;

/// Broad classification of a [`CollabError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input rejected at the boundary.
    Validation,
    /// The owning entity or slot has been disposed.
    State,
    /// A native call returned a failure status.
    Platform,
}

/// Error enum shared by the codecs, the event registry and the entities.
///
/// # Error Code Ranges
///
/// | Range     | Category   | Retried by the bridge |
/// |-----------|------------|-----------------------|
/// | 1000–1999 | Validation | never                 |
/// | 2000–2999 | State      | never                 |
/// | 3000–3999 | Platform   | on the next OS signal |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollabError {
    /// Input failed validation before reaching the native layer.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The slot or entity was disposed and accepts no new subscribers.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// A native call returned a non-zero status.
    #[error("{operation} failed with error code {code:#010x}")]
    Platform {
        /// Name of the native operation that failed.
        operation: &'static str,
        /// OS error code, surfaced unchanged.
        code: HResult,
    },
}

impl CollabError {
    /// Builds a [`CollabError::Platform`] for `operation`.
    #[must_use]
    pub const fn platform(operation: &'static str, code: HResult) -> Self {
        Self::Platform { operation, code }
    }

    /// Builds a [`CollabError::Validation`] from any message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::Config(_) => 1002,
            Self::Disposed(_) => 2001,
            Self::Platform { .. } => 3001,
        }
    }

    /// Returns the category this variant belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorCategory::Validation,
            Self::Disposed(_) => ErrorCategory::State,
            Self::Platform { .. } => ErrorCategory::Platform,
        }
    }

    /// Returns the OS error code carried by a platform error.
    #[must_use]
    pub const fn os_code(&self) -> Option<HResult> {
        match self {
            Self::Platform { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::E_INVALIDARG;

    #[test]
    fn platform_error_displays_hex_code() {
        let err = CollabError::platform("PeerCollabRegisterEvent", E_INVALIDARG);
        assert_eq!(
            err.to_string(),
            "PeerCollabRegisterEvent failed with error code 0x80070057"
        );
        assert_eq!(err.os_code(), Some(E_INVALIDARG));
    }

    #[test]
    fn categories_follow_code_ranges() {
        let validation = CollabError::validation("bad");
        assert_eq!(validation.category(), ErrorCategory::Validation);
        assert_eq!(validation.error_code() / 1000, 1);

        let disposed = CollabError::Disposed("ContactManager");
        assert_eq!(disposed.category(), ErrorCategory::State);
        assert_eq!(disposed.error_code() / 1000, 2);
        assert_eq!(disposed.os_code(), None);

        let platform = CollabError::platform("PeerCollabGetEventData", -1);
        assert_eq!(platform.category(), ErrorCategory::Platform);
        assert_eq!(platform.error_code() / 1000, 3);
    }
}
