//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (POSTCACHE_*)
//! 2. TOML config file (if POSTCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (POSTCACHE_*)
/// 2. TOML config file (if POSTCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL for the shared cache backend.
    ///
    /// Set via POSTCACHE_REDIS_URL environment variable. When unset the
    /// cache runs on the in-process backend.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Redis connect timeout in milliseconds.
    #[serde(default = "default_redis_connect_timeout_ms")]
    pub redis_connect_timeout_ms: u64,

    /// Redis per-command response timeout in milliseconds.
    #[serde(default = "default_redis_response_timeout_ms")]
    pub redis_response_timeout_ms: u64,

    /// Namespace prefix for every cache key.
    ///
    /// Set via POSTCACHE_KEY_PREFIX environment variable.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Domain segment for every cache key.
    #[serde(default = "default_cache_domain")]
    pub cache_domain: String,

    /// TTL for cached list pages, in seconds.
    #[serde(default = "default_list_ttl_secs")]
    pub list_ttl_secs: u64,

    /// TTL for cached posts, in seconds.
    #[serde(default = "default_item_ttl_secs")]
    pub item_ttl_secs: u64,

    /// TTL for cached comment threads, in seconds.
    #[serde(default = "default_comments_ttl_secs")]
    pub comments_ttl_secs: u64,

    /// Age after which a cached envelope is served stale and refreshed in the background.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Base URL of the upstream content API.
    ///
    /// Set via POSTCACHE_UPSTREAM_BASE_URL environment variable.
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Bearer token for the upstream content API.
    #[serde(default)]
    pub upstream_api_key: Option<String>,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between upstream requests in milliseconds.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// How long shutdown waits for in-flight revalidations, in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_redis_connect_timeout_ms() -> u64 {
    2_000
}

fn default_redis_response_timeout_ms() -> u64 {
    1_000
}

fn default_key_prefix() -> String {
    "postcache".into()
}

fn default_cache_domain() -> String {
    "blog".into()
}

fn default_list_ttl_secs() -> u64 {
    60
}

fn default_item_ttl_secs() -> u64 {
    300
}

fn default_comments_ttl_secs() -> u64 {
    120
}

fn default_stale_after_secs() -> u64 {
    30
}

fn default_upstream_base_url() -> String {
    "http://127.0.0.1:8080/api".into()
}

fn default_user_agent() -> String {
    "postcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_min_request_interval_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_connect_timeout_ms: default_redis_connect_timeout_ms(),
            redis_response_timeout_ms: default_redis_response_timeout_ms(),
            key_prefix: default_key_prefix(),
            cache_domain: default_cache_domain(),
            list_ttl_secs: default_list_ttl_secs(),
            item_ttl_secs: default_item_ttl_secs(),
            comments_ttl_secs: default_comments_ttl_secs(),
            stale_after_secs: default_stale_after_secs(),
            upstream_base_url: default_upstream_base_url(),
            upstream_api_key: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl AppConfig {
    /// Upstream timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `POSTCACHE_`
    /// 2. TOML file from `POSTCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("POSTCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("POSTCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Redis URL, if the shared backend is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no Redis URL is set.
    pub fn require_redis_url(&self) -> Result<&str, ConfigError> {
        self.redis_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "redis_url".into(),
            hint: "Set POSTCACHE_REDIS_URL environment variable".into(),
        })
    }
}
