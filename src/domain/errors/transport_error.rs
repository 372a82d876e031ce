//! Transport error types.

use thiserror::Error;

/// Errors produced while acquiring artwork bytes.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum TransportError {
    #[error("invalid resource locator '{locator}': {reason}")]
    InvalidUrl { locator: String, reason: String },

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("request failed: {message}")]
    Network { message: String },

    #[error("failed to read body: {message}")]
    Body { message: String },

    #[error("failed to read local file: {message}")]
    LocalFile { message: String },

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Creates an invalid locator error.
    #[must_use]
    pub fn invalid_url(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true for routine cancellation, which is not worth a warning.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_distinguished() {
        assert!(TransportError::Cancelled.is_cancellation());
        assert!(!TransportError::network("reset").is_cancellation());
        assert!(
            !TransportError::Status {
                status: 404,
                reason: "Not Found".into()
            }
            .is_cancellation()
        );
    }

    #[test]
    fn test_display_includes_locator() {
        let err = TransportError::invalid_url("::not a url", "relative URL without a base");
        assert!(err.to_string().contains("::not a url"));
    }
}
