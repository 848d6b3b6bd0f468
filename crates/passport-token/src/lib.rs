//! # passport-token
//!
//! RS256 token handling for Passport.
//!
//! This crate provides functionality for:
//! - Signing [`Claims`](passport_core::Claims) into tokens with an expiration
//! - Validating tokens back into claims
//! - Classifying validation failures into a small, stable error taxonomy
//! - Running code against a validated [`CallContext`](passport_core::CallContext)
//!
//! ## Error Taxonomy
//!
//! | Error | Code | Meaning |
//! |-------|------|---------|
//! | **INVALID_TOKEN** | 1 | Malformed, wrong algorithm, or bad subject |
//! | **TOKEN_EXPIRED** | 2 | Past its expiry or before its not-before time |
//! | Verification | - | Anything else, passed through untouched (e.g. bad signature) |
//!
//! Callers branch on the variant, never on the message text.

pub mod claims;
pub mod error;
pub mod inspect;
pub mod keys;
pub mod parser;
pub mod signer;

pub use error::TokenError;
pub use inspect::{TokenInfo, inspect_token_unverified};
pub use parser::{RsaTokenParser, TokenParser};
pub use signer::{Clock, RsaTokenSigner, TokenSigner};
