//! Unified error types for postcache.
//!
//! Only the lower cache layers surface these. The `CacheService` facade
//! logs them and degrades to a miss or a no-op instead.

/// Unified error types for the cache core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A Redis command failed (network error, timeout, protocol error).
    #[error("CACHE_BACKEND: {0}")]
    Backend(#[from] redis::RedisError),

    /// The persistent backend could not be reached at startup.
    #[error("CACHE_UNAVAILABLE: {0}")]
    BackendUnavailable(String),

    /// A payload could not be encoded or decoded.
    #[error("CACHE_SERIALIZATION: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upstream content source failed during a refresh.
    #[error("UPSTREAM_ERROR: {0}")]
    Upstream(String),

    /// A background revalidation did not complete.
    #[error("REVALIDATION_FAILED: {0}")]
    RevalidationFailed(String),

    /// Key parameters could not be turned into a JSON value.
    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),
}

impl Error {
    /// Short machine-readable code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Backend(_) => "CACHE_BACKEND",
            Error::BackendUnavailable(_) => "CACHE_UNAVAILABLE",
            Error::Serialization(_) => "CACHE_SERIALIZATION",
            Error::Upstream(_) => "UPSTREAM_ERROR",
            Error::RevalidationFailed(_) => "REVALIDATION_FAILED",
            Error::InvalidKey(_) => "INVALID_KEY",
        }
    }
}
