//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::key::KEY_SEPARATOR;
use crate::config::AppConfig;
use thiserror::Error;

/// Longest TTL accepted for any entity kind (7 days).
const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

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
    /// Returns `ConfigError::Invalid` if:
    /// - any TTL is 0 or exceeds 7 days
    /// - `key_prefix` or `cache_domain` is empty or contains the key separator
    /// - `redis_url` uses an unsupported scheme
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty or `upstream_base_url` is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, ttl) in [
            ("list_ttl_secs", self.list_ttl_secs),
            ("item_ttl_secs", self.item_ttl_secs),
            ("comments_ttl_secs", self.comments_ttl_secs),
        ] {
            if ttl == 0 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be greater than 0".into() });
            }
            if ttl > MAX_TTL_SECS {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not exceed 7 days".into() });
            }
        }

        for (field, segment) in [("key_prefix", &self.key_prefix), ("cache_domain", &self.cache_domain)] {
            if segment.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
            if segment.contains(KEY_SEPARATOR) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("must not contain '{KEY_SEPARATOR}'"),
                });
            }
        }

        if let Some(redis_url) = &self.redis_url {
            let scheme_ok = ["redis://", "rediss://", "unix://"]
                .iter()
                .any(|scheme| redis_url.starts_with(scheme));
            if !scheme_ok {
                return Err(ConfigError::Invalid {
                    field: "redis_url".into(),
                    reason: "must use redis://, rediss:// or unix://".into(),
                });
            }
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

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.upstream_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid {
                    field: "upstream_base_url".into(),
                    reason: "must be an http(s) URL".into(),
                });
            }
        }

        if self.stale_after_secs >= self.item_ttl_secs {
            tracing::warn!(
                stale_after_secs = self.stale_after_secs,
                item_ttl_secs = self.item_ttl_secs,
                "stale_after_secs is not below item_ttl_secs; \
                 posts will expire before they are ever served stale"
            );
        }

        Ok(())
    }
}
