//! Client runtime errors.

use hearth_auth::AuthError;
use hearth_cache::MutationError;
use hearth_core::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl ClientError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Http(_) => ErrorCategory::Network,
            Self::Auth(e) => e.category(),
            Self::Mutation(e) => e.category(),
        }
    }
}

/// Failure of a single GraphQL call, before it is mapped to the caller's
/// error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum CallError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Unauthenticated(String),

    #[error("GraphQL errors: {0}")]
    Graphql(String),

    #[error("invalid response: {0}")]
    Invalid(String),
}

impl CallError {
    fn is_auth_status(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

impl From<CallError> for AuthError {
    fn from(e: CallError) -> Self {
        if e.is_auth_status() {
            return AuthError::unauthorized(e.to_string());
        }
        match e {
            CallError::Network(m) => AuthError::network(m),
            CallError::Status { status, body } => AuthError::server(status, body),
            CallError::Unauthenticated(m) => AuthError::unauthorized(m),
            CallError::Graphql(m) | CallError::Invalid(m) => AuthError::refresh_failed(m),
        }
    }
}

impl From<CallError> for MutationError {
    fn from(e: CallError) -> Self {
        if e.is_auth_status() {
            return MutationError::unauthorized(e.to_string());
        }
        match e {
            CallError::Network(m) => MutationError::transport(m),
            CallError::Status { status, body } => MutationError::server(status, body),
            CallError::Unauthenticated(m) => MutationError::unauthorized(m),
            CallError::Graphql(m) | CallError::Invalid(m) => MutationError::invalid_response(m),
        }
    }
}
