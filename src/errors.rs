//! Error types for the matchwire service
//!
//! One crate-wide taxonomy: validation failures are rejected before any
//! shared state is touched, auth failures before any subscription, and
//! store failures are surfaced rather than retried (retrying a
//! non-idempotent settlement could double-apply funds).

use thiserror::Error;

/// Root error type for all matchwire operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing request fields
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, invalid, or expired token
    #[error("auth error: {0}")]
    Auth(String),

    /// Referenced room is absent or already settled. Terminal, not retried.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// The external atomic store is unavailable or an operation failed
    #[error("store error: {0}")]
    Store(String),

    /// Configuration load or validation failure
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// True when the error means "the room is already gone" - callers
    /// racing settlement against cleanup treat this as a benign no-op.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RoomNotFound(_))
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Store(format!("record encoding: {}", e))
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("bet must be positive".to_string());
        assert!(err.to_string().contains("validation error"));
        assert!(err.to_string().contains("bet must be positive"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::RoomNotFound("r1".into()).is_not_found());
        assert!(!Error::Store("down".into()).is_not_found());
    }
}
