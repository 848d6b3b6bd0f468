//! Token signing.

use crate::claims::RegisteredClaims;
use crate::error::TokenError;
use crate::keys;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use passport_core::{Claims, Token, TokenConfig, UserId};
use std::fmt;
use std::sync::Arc;

/// Source of the current time used to compute token expiry.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Anything that can turn claims into a signed token.
pub trait TokenSigner {
    /// Sign `claims` into a token that expires `ttl` from now.
    ///
    /// A zero or negative ttl yields a token that is already expired.
    fn sign(&self, claims: &Claims, ttl: Duration) -> Result<Token, TokenError>;
}

impl<S: TokenSigner + ?Sized> TokenSigner for &S {
    fn sign(&self, claims: &Claims, ttl: Duration) -> Result<Token, TokenError> {
        (**self).sign(claims, ttl)
    }
}

impl<S: TokenSigner + ?Sized> TokenSigner for Arc<S> {
    fn sign(&self, claims: &Claims, ttl: Duration) -> Result<Token, TokenError> {
        (**self).sign(claims, ttl)
    }
}

/// Signs RS256 tokens with an RSA private key.
#[derive(Clone)]
pub struct RsaTokenSigner {
    key: EncodingKey,
    clock: Clock,
    default_ttl: Duration,
}

impl RsaTokenSigner {
    /// Create a signer from a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    pub fn from_pem(private_key: &[u8]) -> Result<Self, TokenError> {
        Ok(Self {
            key: keys::load_private_key(private_key)?,
            clock: Arc::new(Utc::now),
            default_ttl: Duration::minutes(15),
        })
    }

    /// Create a signer from configuration.
    pub fn from_config(config: &TokenConfig) -> Result<Self, TokenError> {
        let pem = config.require_private_key()?;
        let signer = Self::from_pem(pem.as_bytes())?.with_default_ttl(config.default_ttl()?);
        tracing::debug!(default_ttl = %signer.default_ttl, "Token signer configured");
        Ok(signer)
    }

    /// Replace the clock used to compute expiry.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Sign with the configured default ttl.
    pub fn sign_default(&self, claims: &Claims) -> Result<Token, TokenError> {
        self.sign(claims, self.default_ttl)
    }
}

impl TokenSigner for RsaTokenSigner {
    fn sign(&self, claims: &Claims, ttl: Duration) -> Result<Token, TokenError> {
        if claims.user_id > UserId::MAX {
            return Err(TokenError::UserIdOutOfRange(claims.user_id));
        }

        let expires_at = (self.clock)()
            .checked_add_signed(ttl)
            .ok_or(TokenError::TtlOutOfRange)?;

        let registered = RegisteredClaims {
            sub: claims.user_id.to_string(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &registered, &self.key)
            .map_err(|e| TokenError::Signing(Arc::new(e)))?;

        tracing::debug!(user_id = %claims.user_id, %expires_at, "Signed token");
        Ok(Token::new(token))
    }
}

impl fmt::Debug for RsaTokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaTokenSigner")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
