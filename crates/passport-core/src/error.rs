//! Error types for the core crate.

use std::num::ParseIntError;
use thiserror::Error;

/// A token subject that is not a valid user id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseUserIdError {
    #[error("user id is not a non-negative decimal integer: {0}")]
    Invalid(#[from] ParseIntError),

    #[error("user id {0} exceeds the signed 64-bit range")]
    OutOfRange(u64),
}

/// Errors that can occur while loading Passport configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration or key file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid YAML for the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A duration string could not be understood.
    #[error("invalid duration '{value}': expected forms like 24h, 7d, 30m, 60s")]
    InvalidDuration { value: String },

    /// A required key was not configured or could not be found.
    #[error("{which} key not configured: set {which}_key_env or {which}_key_file")]
    MissingKey { which: &'static str },

    /// Configured clock-skew tolerance is larger than allowed.
    #[error("leeway of {value}s exceeds the maximum of {max}s")]
    LeewayOutOfRange { value: u64, max: u64 },
}
