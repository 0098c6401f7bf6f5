//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `base_url` is missing, unparsable, or not http(s)
    /// - `port` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `local_root` does not start and end with `/`
    /// - any cache TTL or sweep interval is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;

        if self.port == 0 {
            return Err(ConfigError::Invalid { field: "port".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !self.local_root.starts_with('/') || !self.local_root.ends_with('/') {
            return Err(ConfigError::Invalid {
                field: "local_root".into(),
                reason: "must start and end with '/'".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        let cache = &self.cache;
        for (field, value) in [
            ("cache.metadata_ttl_secs", cache.metadata_ttl_secs),
            ("cache.metadata_sweep_secs", cache.metadata_sweep_secs),
            ("cache.downloads_ttl_secs", cache.downloads_ttl_secs),
            ("cache.downloads_sweep_secs", cache.downloads_sweep_secs),
            ("cache.responses_ttl_secs", cache.responses_ttl_secs),
            ("cache.responses_sweep_secs", cache.responses_sweep_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be greater than 0".into() });
            }
        }

        if self.username.is_empty() || self.password.is_empty() {
            tracing::warn!(
                username_set = !self.username.is_empty(),
                password_set = !self.password.is_empty(),
                "Upstream credentials are incomplete; requests will likely be rejected"
            );
        }

        if self.home_space_key.is_empty() || self.home_page.is_empty() {
            tracing::warn!("home_space_key or home_page is unset; the root route will return not found");
        }

        Ok(())
    }
}
