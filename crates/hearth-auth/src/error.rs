//! Session error types.
//!
//! This module defines the errors that can occur while consuming, renewing
//! and discarding session tokens.

use hearth_core::ErrorCategory;

use crate::token::TokenError;

/// Errors that can occur during session operations.
///
/// The type is `Clone` because a single refresh result is shared between
/// every caller that joined the same in-flight renewal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The access token is malformed and cannot be decoded.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The access token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// No credential is available for the requested operation.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of the missing credential.
        message: String,
    },

    /// The refresh endpoint rejected the renewal or returned an unusable pair.
    #[error("Refresh failed: {message}")]
    RefreshFailed {
        /// Description of the refresh failure.
        message: String,
    },

    /// The request never produced a response.
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or summary.
        message: String,
    },

    /// The session configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `RefreshFailed` error.
    #[must_use]
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
        }
    }

    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `Server` error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the user has to sign in again to recover.
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        match self {
            Self::InvalidToken { .. } | Self::TokenExpired | Self::Unauthorized { .. } => true,
            Self::Server { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidToken { .. } => ErrorCategory::Validation,
            Self::TokenExpired | Self::Unauthorized { .. } | Self::RefreshFailed { .. } => {
                ErrorCategory::Authentication
            }
            Self::Network { .. } => ErrorCategory::Network,
            Self::Server { .. } => ErrorCategory::Rejected,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::invalid_token(err.to_string())
    }
}
