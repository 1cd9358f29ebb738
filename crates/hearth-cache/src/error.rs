//! Mutation error types.

use hearth_core::ErrorCategory;

/// Errors that can occur while applying a mutation.
///
/// Every variant leaves the cache as it was before the mutation started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The request never produced a usable response.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-success HTTP status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The session is missing or no longer accepted.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The server processed the mutation and reported `FAILED`.
    #[error("Mutation {operation} was rejected")]
    Rejected { operation: String },

    /// The response could not be read.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl MutationError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(operation: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns `true` if the user has to sign in again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Server { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Network,
            Self::Server { .. } | Self::Rejected { .. } => ErrorCategory::Rejected,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::InvalidResponse { .. } => ErrorCategory::Serialization,
        }
    }
}
