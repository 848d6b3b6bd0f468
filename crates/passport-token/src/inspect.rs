//! Unverified token inspection, for debugging and tooling only.

use crate::error::TokenError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, decode_header};
use passport_core::Token;
use serde_json::Value;

/// Information about a token (for inspection).
#[derive(Debug, Clone)]
pub struct TokenInfo {
    /// Algorithm named in the header.
    pub algorithm: Algorithm,
    /// Raw subject claim, if present.
    pub subject: Option<String>,
    /// Expiry claim, if present.
    pub expires_at: Option<DateTime<Utc>>,
    /// The whole decoded payload.
    pub payload: Value,
}

impl TokenInfo {
    /// Whether the expiry claim lies in the past.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Decode a token's header and payload without checking the signature.
///
/// Never use the result for authorization decisions.
pub fn inspect_token_unverified(token: &Token) -> Result<TokenInfo, TokenError> {
    let header = decode_header(token.as_str()).map_err(|_| TokenError::InvalidToken)?;

    let payload_segment = token
        .as_str()
        .split('.')
        .nth(1)
        .ok_or(TokenError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_segment)
        .map_err(|_| TokenError::InvalidToken)?;
    let payload: Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::InvalidToken)?;

    let subject = payload.get("sub").and_then(Value::as_str).map(str::to_string);
    let expires_at = payload
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::from_timestamp(exp, 0));

    Ok(TokenInfo {
        algorithm: header.alg,
        subject,
        expires_at,
        payload,
    })
}
