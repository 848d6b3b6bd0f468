//! Token validation.

use crate::claims::RegisteredClaims;
use crate::error::TokenError;
use crate::keys;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use passport_core::{
    CallContext, CallScope, Claims, MAX_LEEWAY_SECS, Token, TokenConfig, UserId,
};
use std::fmt;
use std::sync::Arc;

/// Anything that can turn a token back into claims.
///
/// Only [`parse`](TokenParser::parse) is required; the callback helpers are built on it.
pub trait TokenParser {
    /// Validate `token` and return its claims.
    fn parse(&self, token: &Token) -> Result<Claims, TokenError>;

    /// Parse `token` and, only if it is valid, pass the claims to `f`.
    ///
    /// Parse failures are returned as `E::from(TokenError)`; whatever `f` returns is
    /// returned unchanged.
    fn parse_with_claims<T, E, F>(&self, token: &Token, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(Claims) -> Result<T, E>,
        E: From<TokenError>,
    {
        let claims = self.parse(token)?;
        f(claims)
    }

    /// Parse the token carried by `ctx` and, only if it is valid, run `f` inside a
    /// [`CallScope`] built from `ctx`.
    ///
    /// The scope is cancelled before this returns, whether `f` succeeds, fails or
    /// panics. No scope is created when parsing fails.
    fn parse_ctx_with_claims<T, E, F>(&self, ctx: &CallContext, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&CallScope, Claims) -> Result<T, E>,
        E: From<TokenError>,
    {
        let claims = self.parse(&ctx.token)?;
        let (scope, _guard) = ctx.to_scope();
        f(&scope, claims)
    }
}

impl<P: TokenParser + ?Sized> TokenParser for &P {
    fn parse(&self, token: &Token) -> Result<Claims, TokenError> {
        (**self).parse(token)
    }
}

impl<P: TokenParser + ?Sized> TokenParser for Arc<P> {
    fn parse(&self, token: &Token) -> Result<Claims, TokenError> {
        (**self).parse(token)
    }
}

/// Validates RS256 tokens with an RSA public key.
#[derive(Clone)]
pub struct RsaTokenParser {
    key: DecodingKey,
    validation: Validation,
}

impl RsaTokenParser {
    /// Create a parser from a PEM-encoded RSA public key.
    pub fn from_pem(public_key: &[u8]) -> Result<Self, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            key: keys::load_public_key(public_key)?,
            validation,
        })
    }

    /// Create a parser from configuration.
    pub fn from_config(config: &TokenConfig) -> Result<Self, TokenError> {
        let pem = config.require_public_key()?;
        let leeway = config.leeway_secs()?;
        Ok(Self::from_pem(pem.as_bytes())?.with_leeway(leeway))
    }

    /// Tolerate `secs` of clock skew when checking expiry and not-before.
    ///
    /// Capped at [`MAX_LEEWAY_SECS`].
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validation.leeway = secs.min(MAX_LEEWAY_SECS);
        self
    }
}

impl TokenParser for RsaTokenParser {
    fn parse(&self, token: &Token) -> Result<Claims, TokenError> {
        let data = decode::<RegisteredClaims>(token.as_str(), &self.key, &self.validation)
            .map_err(classify)?;

        // A token is already expired in the second its exp names
        let cutoff = Utc::now().timestamp() - self.validation.leeway as i64;
        if data.claims.exp <= cutoff {
            tracing::debug!(exp = data.claims.exp, "Token rejected at its expiry second");
            return Err(TokenError::TokenExpired);
        }

        let user_id = data.claims.sub.parse::<UserId>().map_err(|_| {
            tracing::debug!("Token subject is not a user id");
            TokenError::InvalidToken
        })?;

        Ok(Claims { user_id })
    }
}

impl fmt::Debug for RsaTokenParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaTokenParser")
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

/// Map a decode failure onto the error taxonomy.
fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    let classified = match err.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidClaimFormat(_) => TokenError::InvalidToken,
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => TokenError::TokenExpired,
        _ => TokenError::Verification(Arc::new(err)),
    };
    tracing::debug!(error = %classified, "Token rejected");
    classified
}
