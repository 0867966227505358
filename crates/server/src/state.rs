//! Shared state behind every tool call.

use std::sync::Arc;
use std::time::Duration;

use postcache_client::ContentSource;
use postcache_core::{AppConfig, CacheService, CacheSettings};
use tokio::sync::OnceCell;

/// Configuration, the upstream source, and the lazily connected cache.
pub struct AppState {
    config: AppConfig,
    source: Arc<dyn ContentSource>,
    cache: OnceCell<CacheService>,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn ContentSource>) -> Self {
        Self { config, source, cache: OnceCell::new() }
    }

    /// State around an already built cache.
    #[cfg(test)]
    pub fn with_cache(config: AppConfig, source: Arc<dyn ContentSource>, cache: CacheService) -> Self {
        Self { config, source, cache: OnceCell::new_with(Some(cache)) }
    }

    /// The cache, connecting on first use.
    ///
    /// Concurrent first calls share one connection attempt.
    pub async fn cache(&self) -> &CacheService {
        self.cache
            .get_or_init(|| async {
                let cache = CacheService::connect(CacheSettings::from(&self.config)).await;
                tracing::info!(backend = %cache.backend_kind(), "cache ready");
                cache
            })
            .await
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    /// Age past which a cached entry is served stale and refreshed.
    pub fn stale_after(&self) -> Duration {
        self.config.stale_after()
    }

    /// Drain background refreshes. No-op if the cache was never used.
    pub async fn shutdown(&self) {
        let Some(cache) = self.cache.get() else {
            return;
        };
        let grace = self.config.shutdown_grace();
        let abandoned = cache.shutdown(grace).await;
        tracing::info!(abandoned, "cache shut down");
    }
}
