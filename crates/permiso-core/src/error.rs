//! Error types for the Permiso core library.

use thiserror::Error;

use crate::token::RequestToken;

/// Result type alias using Permiso Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Permiso operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A request was made with no live execution context registered.
    #[error("No active execution context. Call set_context() before requesting permissions")]
    NoActiveContext,

    /// The host reported a result for a token that is not outstanding.
    #[error("Unknown request token: {token}")]
    UnknownToken { token: RequestToken },

    /// The host's permission and grant lists differ in length.
    #[error("Malformed host resolution: {permissions} permissions but {grants} grant results")]
    MalformedResolution { permissions: usize, grants: usize },

    /// Every token in the configured range is held by an outstanding request.
    #[error("All request tokens are in use")]
    TokensExhausted,

    /// The coordinator behind a rationale continuation no longer exists.
    #[error("Coordinator was dropped before the rationale was provided")]
    CoordinatorDropped,

    /// Internal state lock was poisoned (a thread panicked while holding it).
    #[error("Coordinator state lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller can log and carry on. Stale or duplicate host
    /// deliveries are expected and leave the coordinator consistent.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownToken { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_token_is_recoverable() {
        assert!(Error::UnknownToken { token: RequestToken::new(3) }.is_recoverable());
        assert!(!Error::NoActiveContext.is_recoverable());
        assert!(!Error::MalformedResolution { permissions: 2, grants: 1 }.is_recoverable());
    }

    #[test]
    fn messages_name_the_token() {
        let msg = Error::UnknownToken { token: RequestToken::new(9) }.to_string();
        assert_eq!(msg, "Unknown request token: #9");
    }
}
