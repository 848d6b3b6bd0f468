//! Error types for token operations.

use passport_core::{ConfigError, UserId};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while signing or validating tokens.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// Token is malformed, uses the wrong algorithm, or carries a bad subject.
    #[error("INVALID_TOKEN")]
    InvalidToken,

    /// Token is past its expiry or not yet valid.
    #[error("TOKEN_EXPIRED")]
    TokenExpired,

    /// Any other verification failure, e.g. a bad signature.
    #[error("token verification failed: {0}")]
    Verification(#[source] Arc<jsonwebtoken::errors::Error>),

    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Failed to encode and sign a token.
    #[error("failed to sign token: {0}")]
    Signing(#[source] Arc<jsonwebtoken::errors::Error>),

    /// The user id does not fit the signed 64-bit range peers parse subjects into.
    #[error("user id {0} out of range")]
    UserIdOutOfRange(UserId),

    /// The expiry computed from the ttl is not representable.
    #[error("token ttl out of range")]
    TtlOutOfRange,

    /// Key or ttl configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(#[source] Arc<ConfigError>),
}

impl TokenError {
    /// Stable numeric code for the classified validation errors.
    pub fn code(&self) -> Option<i32> {
        match self {
            TokenError::InvalidToken => Some(1),
            TokenError::TokenExpired => Some(2),
            _ => None,
        }
    }

    /// Stable name for the classified validation errors.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            TokenError::InvalidToken => Some("INVALID_TOKEN"),
            TokenError::TokenExpired => Some("TOKEN_EXPIRED"),
            _ => None,
        }
    }

    pub fn is_invalid_token(&self) -> bool {
        matches!(self, TokenError::InvalidToken)
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(self, TokenError::TokenExpired)
    }
}

impl From<ConfigError> for TokenError {
    fn from(err: ConfigError) -> Self {
        TokenError::Config(Arc::new(err))
    }
}
