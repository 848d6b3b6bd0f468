//! # passport-core
//!
//! Shared types for Passport service-to-service authorization.
//!
//! This crate provides:
//! - The authenticated payload carried by tokens ([`Claims`], [`UserId`])
//! - The opaque [`Token`] string
//! - [`CallContext`], the per-call bundle of token, deadline, tracing id and data
//!   that crosses service boundaries
//! - [`CallScope`], the runtime view of a call: cancellation, deadline and the
//!   attached values
//! - Configuration loading ([`PassportConfig`], [`TokenConfig`])
//!
//! ## Call context and call scope
//!
//! | Type | Lives | Carries |
//! |------|-------|---------|
//! | **CallContext** | On the wire, between services | Token, unix deadline, tracing id, data |
//! | **CallScope** | Inside one service, for one call | Cancellation, deadline, the same values |
//!
//! `CallContext::to_scope` and `CallContext::from_scope` convert between the two.
//! The data map is shared by reference, not copied.

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod scope;

pub use claims::{Claims, Token, UserId};
pub use config::{MAX_LEEWAY_SECS, PassportConfig, TokenConfig, parse_duration};
pub use context::{CallContext, SharedData};
pub use error::{ConfigError, ParseUserIdError};
pub use scope::{CallScope, CancelGuard, ScopeError};
