//! Cache configuration
//!
//! Configuration is loaded from environment variables with defaults suited
//! to development: without a TTL the cache is only refreshed by mutations
//! and explicit reloads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the default cache TTL in seconds.
pub const CACHE_TTL_ENV: &str = "GAZETTEER_CACHE_TTL_SECS";

/// Configuration for one composite-key cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of the cached snapshot. `None` means it never expires.
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable expiry.
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Reject a zero TTL, which would force a rescan on every read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue {
                field: "ttl".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Create a CacheConfig from `GAZETTEER_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var(CACHE_TTL_ENV)
    }

    /// Create a CacheConfig from the named environment variable.
    ///
    /// Unset or empty means no TTL.
    pub fn from_env_var(var: &str) -> Result<Self, ConfigError> {
        let raw = std::env::var(var).ok();
        Self::from_ttl_setting(var, raw.as_deref())
    }

    /// Parse a TTL setting expressed in (possibly fractional) seconds.
    pub fn from_ttl_setting(field: &str, raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let secs: f64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "must be a number of seconds".to_string(),
        })?;

        let ttl = Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })?;

        let config = Self { ttl: Some(ttl) };
        config.validate().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        })?;
        Ok(config)
    }
}
