//! Cache-facing settings derived from `AppConfig`.

use std::time::Duration;

use crate::AppConfig;

/// Everything the cache core needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub redis_url: Option<String>,
    pub redis_connect_timeout: Duration,
    pub redis_response_timeout: Duration,
    pub key_prefix: String,
    pub domain: String,
    pub list_ttl: Duration,
    pub item_ttl: Duration,
    pub comments_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CacheSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            redis_url: config.redis_url.clone(),
            redis_connect_timeout: Duration::from_millis(config.redis_connect_timeout_ms),
            redis_response_timeout: Duration::from_millis(config.redis_response_timeout_ms),
            key_prefix: config.key_prefix.clone(),
            domain: config.cache_domain.clone(),
            list_ttl: Duration::from_secs(config.list_ttl_secs),
            item_ttl: Duration::from_secs(config.item_ttl_secs),
            comments_ttl: Duration::from_secs(config.comments_ttl_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let config = AppConfig {
            redis_url: Some("redis://127.0.0.1:6379".into()),
            list_ttl_secs: 15,
            key_prefix: "staging".into(),
            ..Default::default()
        };
        let settings = CacheSettings::from(&config);
        assert_eq!(settings.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(settings.list_ttl, Duration::from_secs(15));
        assert_eq!(settings.item_ttl, Duration::from_secs(300));
        assert_eq!(settings.key_prefix, "staging");
        assert_eq!(settings.domain, "blog");
    }
}
