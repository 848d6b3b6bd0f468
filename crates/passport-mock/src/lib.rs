//! # passport-mock
//!
//! Test doubles for [`TokenSigner`] and [`TokenParser`].
//!
//! Both doubles return canned values and record what they were called with.
//! After exercising the code under test, call `verify()` to check that the
//! double was called with the expected arguments.
//!
//! ```
//! use chrono::Duration;
//! use passport_core::{Claims, Token};
//! use passport_mock::MockSigner;
//! use passport_token::TokenSigner;
//!
//! let signer = MockSigner::returning(Token::new("t"))
//!     .expect_claims(Claims::new(42))
//!     .expect_ttl(Duration::minutes(5));
//!
//! signer.sign(&Claims::new(42), Duration::minutes(5)).unwrap();
//! signer.verify().unwrap();
//! ```

use chrono::Duration;
use parking_lot::Mutex;
use passport_core::{Claims, Token};
use passport_token::{TokenError, TokenParser, TokenSigner};
use thiserror::Error;

/// Reasons a double's expectations were not met.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    #[error("method was not called")]
    MethodNotCalled,

    #[error("unexpected token: expected {expected:?}, got {actual:?}")]
    UnexpectedToken { expected: Token, actual: Token },

    #[error("unexpected claims: expected {expected:?}, got {actual:?}")]
    UnexpectedClaims { expected: Claims, actual: Claims },

    #[error("unexpected ttl: expected {expected}, got {actual}")]
    UnexpectedTtl { expected: Duration, actual: Duration },
}

#[derive(Debug, Default)]
struct SignCall {
    count: usize,
    last: Option<(Claims, Duration)>,
}

/// A [`TokenSigner`] that returns a fixed token or error.
#[derive(Debug)]
pub struct MockSigner {
    token: Token,
    error: Option<TokenError>,
    expected_claims: Claims,
    expected_ttl: Duration,
    calls: Mutex<SignCall>,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self {
            token: Token::empty(),
            error: None,
            expected_claims: Claims::default(),
            expected_ttl: Duration::zero(),
            calls: Mutex::new(SignCall::default()),
        }
    }
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signer whose `sign` returns `token`.
    pub fn returning(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// A signer whose `sign` fails with `error`.
    pub fn failing(error: TokenError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn expect_claims(mut self, claims: Claims) -> Self {
        self.expected_claims = claims;
        self
    }

    pub fn expect_ttl(mut self, ttl: Duration) -> Self {
        self.expected_ttl = ttl;
        self
    }

    /// Number of `sign` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().count
    }

    /// Arguments of the most recent `sign` call.
    pub fn last_call(&self) -> Option<(Claims, Duration)> {
        self.calls.lock().last
    }

    /// Check that `sign` was called, and that its last call used the expected
    /// claims and ttl.
    pub fn verify(&self) -> Result<(), MockError> {
        let (claims, ttl) = self.last_call().ok_or(MockError::MethodNotCalled)?;
        if claims != self.expected_claims {
            return Err(MockError::UnexpectedClaims {
                expected: self.expected_claims,
                actual: claims,
            });
        }
        if ttl != self.expected_ttl {
            return Err(MockError::UnexpectedTtl {
                expected: self.expected_ttl,
                actual: ttl,
            });
        }
        Ok(())
    }
}

impl TokenSigner for MockSigner {
    fn sign(&self, claims: &Claims, ttl: Duration) -> Result<Token, TokenError> {
        {
            let mut calls = self.calls.lock();
            calls.count += 1;
            calls.last = Some((*claims, ttl));
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.token.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct ParseCall {
    count: usize,
    last: Option<Token>,
}

/// A [`TokenParser`] that returns fixed claims or an error.
///
/// The callback helpers are the trait's provided methods, so they record a
/// `parse` call and honour the configured error like the real parser.
#[derive(Debug, Default)]
pub struct MockParser {
    claims: Claims,
    error: Option<TokenError>,
    expected_token: Token,
    calls: Mutex<ParseCall>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// A parser whose `parse` returns `claims`.
    pub fn returning(claims: Claims) -> Self {
        Self {
            claims,
            ..Self::default()
        }
    }

    /// A parser whose `parse` fails with `error`.
    pub fn failing(error: TokenError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn expect_token(mut self, token: impl Into<Token>) -> Self {
        self.expected_token = token.into();
        self
    }

    /// Number of `parse` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().count
    }

    /// Token passed to the most recent `parse` call.
    pub fn last_token(&self) -> Option<Token> {
        self.calls.lock().last.clone()
    }

    /// Check that `parse` was called, and that its last call used the
    /// expected token.
    pub fn verify(&self) -> Result<(), MockError> {
        let token = self.last_token().ok_or(MockError::MethodNotCalled)?;
        if token != self.expected_token {
            return Err(MockError::UnexpectedToken {
                expected: self.expected_token.clone(),
                actual: token,
            });
        }
        Ok(())
    }
}

impl TokenParser for MockParser {
    fn parse(&self, token: &Token) -> Result<Claims, TokenError> {
        {
            let mut calls = self.calls.lock();
            calls.count += 1;
            calls.last = Some(token.clone());
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.claims),
        }
    }
}
