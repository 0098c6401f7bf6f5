//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CONVERGENCE_*)
//! 2. TOML config file (if CONVERGENCE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{CacheConfig, PoolConfig};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CONVERGENCE_*)
/// 2. TOML config file (if CONVERGENCE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the upstream host, e.g. `https://example.atlassian.net/`.
    ///
    /// Set via CONVERGENCE_BASE_URL environment variable.
    #[serde(default)]
    pub base_url: String,

    /// Upstream basic-auth username.
    ///
    /// Set via CONVERGENCE_USERNAME environment variable.
    #[serde(default)]
    pub username: String,

    /// Upstream basic-auth password or API token.
    ///
    /// Set via CONVERGENCE_PASSWORD environment variable.
    #[serde(default)]
    pub password: String,

    /// Listening port.
    ///
    /// Set via CONVERGENCE_PORT environment variable.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Space served by the root route.
    ///
    /// Set via CONVERGENCE_HOME_SPACE_KEY environment variable.
    #[serde(default)]
    pub home_space_key: String,

    /// Page served by the root route: a numeric id or a title.
    ///
    /// Set via CONVERGENCE_HOME_PAGE environment variable.
    #[serde(default)]
    pub home_page: String,

    /// Local path prefix that upstream links are rewritten under.
    #[serde(default = "default_local_root")]
    pub local_root: String,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Page size requested from the space listing endpoint.
    #[serde(default = "default_space_limit")]
    pub space_limit: u32,

    /// Pool expiration settings.
    ///
    /// Nested keys use `__`, e.g. CONVERGENCE_CACHE__METADATA_TTL_SECS.
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Per-pool TTL and sweep interval, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub metadata_ttl_secs: u64,
    pub metadata_sweep_secs: u64,
    pub downloads_ttl_secs: u64,
    pub downloads_sweep_secs: u64,
    pub responses_ttl_secs: u64,
    pub responses_sweep_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            metadata_ttl_secs: defaults.metadata.ttl.as_secs(),
            metadata_sweep_secs: defaults.metadata.sweep_interval.as_secs(),
            downloads_ttl_secs: defaults.downloads.ttl.as_secs(),
            downloads_sweep_secs: defaults.downloads.sweep_interval.as_secs(),
            responses_ttl_secs: defaults.responses.ttl.as_secs(),
            responses_sweep_secs: defaults.responses.sweep_interval.as_secs(),
        }
    }
}

impl CacheSettings {
    /// Convert to the cache store's configuration.
    pub fn to_cache_config(&self) -> CacheConfig {
        let pool = |ttl, sweep| PoolConfig::new(Duration::from_secs(ttl), Duration::from_secs(sweep));
        CacheConfig {
            metadata: pool(self.metadata_ttl_secs, self.metadata_sweep_secs),
            downloads: pool(self.downloads_ttl_secs, self.downloads_sweep_secs),
            responses: pool(self.responses_ttl_secs, self.responses_sweep_secs),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_local_root() -> String {
    "/".into()
}

fn default_user_agent() -> String {
    "convergence/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_space_limit() -> u32 {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            port: default_port(),
            home_space_key: String::new(),
            home_page: String::new(),
            local_root: default_local_root(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            space_limit: default_space_limit(),
            cache: CacheSettings::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed upstream base URL, always ending in `/`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing, unparsable, or not http(s).
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Missing {
                field: "base_url".into(),
                hint: "Set CONVERGENCE_BASE_URL environment variable".into(),
            });
        }

        let with_slash = if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };
        let url = Url::parse(&with_slash)
            .map_err(|e| ConfigError::Invalid { field: "base_url".into(), reason: e.to_string() })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid {
                field: "base_url".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CONVERGENCE_`
    /// 2. TOML file from `CONVERGENCE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CONVERGENCE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CONVERGENCE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
