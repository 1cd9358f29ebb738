use thiserror::Error;

/// Core error types shared by the Hearth crates
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidId(_) | Self::InvalidTimestamp(_) => ErrorCategory::Validation,
        }
    }
}

/// Error categories used as a structured logging field across crates.
///
/// Each crate's error type maps onto one of these so that log filters and
/// user-facing notices can be chosen without matching on concrete variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Network,
    Rejected,
    Serialization,
    Configuration,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Network => write!(f, "network"),
            Self::Rejected => write!(f, "rejected"),
            Self::Serialization => write!(f, "serialization"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_id("");
        assert_eq!(err.to_string(), "Invalid identifier: ");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_invalid_timestamp() {
        let err = CoreError::invalid_timestamp("-99999999999999");
        assert_eq!(err.to_string(), "Invalid timestamp: -99999999999999");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Network.to_string(), "network");
        assert_eq!(ErrorCategory::Rejected.to_string(), "rejected");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }
}
