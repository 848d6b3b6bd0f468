//! Wire form of the claims carried in a token.

use serde::{Deserialize, Serialize};

/// Registered JWT claims used by Passport tokens: subject and expiry only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Decimal user id.
    pub sub: String,

    /// Expiry (seconds since epoch).
    pub exp: i64,
}
