//! Configuration types for Passport.
//!
//! Configuration is loaded from a YAML file (usually `passport.yaml`):
//!
//! ```yaml
//! token:
//!   private_key_file: keys/signing.pem
//!   public_key_env: PASSPORT_PUBLIC_KEY_PEM
//!   default_ttl: 15m
//!   leeway_secs: 0
//! ```

use crate::error::ConfigError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest clock-skew tolerance accepted when validating tokens, in seconds.
pub const MAX_LEEWAY_SECS: u64 = 86_400;

/// Complete Passport configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassportConfig {
    /// Token signing and validation settings.
    #[serde(default)]
    pub token: TokenConfig,
}

impl PassportConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded passport configuration");
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration for token signing and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Environment variable containing the PEM-encoded public key.
    #[serde(default)]
    pub public_key_env: Option<String>,

    /// Path to the PEM-encoded public key file.
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,

    /// Environment variable containing the PEM-encoded private key.
    #[serde(default)]
    pub private_key_env: Option<String>,

    /// Path to the PEM-encoded private key file.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Lifetime of newly signed tokens (e.g., "15m", "24h").
    #[serde(default = "default_ttl")]
    pub default_ttl: String,

    /// Clock skew tolerated when checking expiry, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            public_key_env: None,
            public_key_file: None,
            private_key_env: None,
            private_key_file: None,
            default_ttl: default_ttl(),
            leeway_secs: 0,
        }
    }
}

impl TokenConfig {
    /// Resolve the public key from environment or file.
    pub fn resolve_public_key(&self) -> Result<Option<String>, ConfigError> {
        resolve_key(self.public_key_env.as_deref(), self.public_key_file.as_deref())
    }

    /// Resolve the private key from environment or file.
    pub fn resolve_private_key(&self) -> Result<Option<String>, ConfigError> {
        resolve_key(
            self.private_key_env.as_deref(),
            self.private_key_file.as_deref(),
        )
    }

    /// Like [`resolve_public_key`](Self::resolve_public_key), but a missing key is an error.
    pub fn require_public_key(&self) -> Result<String, ConfigError> {
        self.resolve_public_key()?
            .ok_or(ConfigError::MissingKey { which: "public" })
    }

    /// Like [`resolve_private_key`](Self::resolve_private_key), but a missing key is an error.
    pub fn require_private_key(&self) -> Result<String, ConfigError> {
        self.resolve_private_key()?
            .ok_or(ConfigError::MissingKey { which: "private" })
    }

    /// The configured leeway, rejected if above [`MAX_LEEWAY_SECS`].
    pub fn leeway_secs(&self) -> Result<u64, ConfigError> {
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::LeewayOutOfRange {
                value: self.leeway_secs,
                max: MAX_LEEWAY_SECS,
            });
        }
        Ok(self.leeway_secs)
    }

    /// The configured default ttl as a duration.
    pub fn default_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.default_ttl)
    }
}

fn resolve_key(env_var: Option<&str>, path: Option<&Path>) -> Result<Option<String>, ConfigError> {
    // Environment variable wins over file
    if let Some(env_var) = env_var {
        if let Ok(key) = std::env::var(env_var) {
            return Ok(Some(key));
        }
    }

    if let Some(path) = path {
        if path.exists() {
            let key = fs::read_to_string(path)?;
            return Ok(Some(key.trim().to_string()));
        }
        tracing::warn!(path = %path.display(), "Configured key file does not exist");
    }

    Ok(None)
}

fn default_ttl() -> String {
    "15m".to_string()
}

/// Parse a duration string like "24h", "7d", "30m" or "60s".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim().to_lowercase();
    let invalid = || ConfigError::InvalidDuration { value: s.clone() };

    let (digits, unit): (&str, fn(i64) -> Option<Duration>) =
        if let Some(d) = s.strip_suffix('d') {
            (d, Duration::try_days)
        } else if let Some(h) = s.strip_suffix('h') {
            (h, Duration::try_hours)
        } else if let Some(m) = s.strip_suffix('m') {
            (m, Duration::try_minutes)
        } else if let Some(sec) = s.strip_suffix('s') {
            (sec, Duration::try_seconds)
        } else {
            (s.as_str(), Duration::try_seconds)
        };

    let value: i64 = digits.trim().parse().map_err(|_| invalid())?;
    unit(value).ok_or_else(invalid)
}
