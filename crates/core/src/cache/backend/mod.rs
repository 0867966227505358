//! Storage backends.
//!
//! ```text
//! Backend (enum)              <- selected once at construction
//!   ├── Redis(RedisBackend)   <- shared store, ConnectionManager-based
//!   └── Memory(MemoryBackend) <- process-local fallback, same tag semantics
//! ```
//!
//! The two are never mixed for one cache instance: if Redis is configured but
//! unreachable at startup, the instance stays on the in-memory backend for its
//! whole lifetime instead of reconnecting mid-process.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::cache::CacheSettings;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;

/// Capability interface shared by every backend.
///
/// Keys and tags are plain strings here; namespacing happens one layer up.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch raw bytes. Expired or missing keys are `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Store raw bytes that expire after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error>;

    /// Delete a batch of keys. Empty batches and absent keys are no-ops.
    async fn delete(&self, keys: &[String]) -> Result<(), Error>;

    /// Add `key` to the member set stored under `tag`.
    async fn tag_add_member(&self, tag: &str, key: &str) -> Result<(), Error>;

    /// Current members of `tag`. Missing or expired tags have no members.
    async fn tag_members(&self, tag: &str) -> Result<Vec<String>, Error>;

    /// (Re)arm the TTL of the member set stored under `tag`.
    async fn tag_expire(&self, tag: &str, ttl: Duration) -> Result<(), Error>;

    /// Drop the member set stored under `tag`.
    async fn tag_delete(&self, tag: &str) -> Result<(), Error>;
}

/// Which backend an instance ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Redis => f.write_str("redis"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// The backend chosen for one cache instance.
pub enum Backend {
    Redis(RedisBackend),
    Memory(MemoryBackend),
}

impl Backend {
    /// Pick the backend for a new cache instance.
    ///
    /// Redis is used only when a URL is configured and the connection check
    /// succeeds. Every other outcome lands on the in-memory backend and is
    /// logged once here.
    pub async fn select(settings: &CacheSettings) -> Self {
        let Some(url) = settings.redis_url.as_deref() else {
            tracing::info!(backend = %BackendKind::Memory, "no redis_url configured, using in-process cache");
            return Backend::Memory(MemoryBackend::new());
        };

        match RedisBackend::connect(url, settings.redis_connect_timeout, settings.redis_response_timeout).await {
            Ok(redis) => {
                tracing::info!(backend = %BackendKind::Redis, "connected to shared cache backend");
                Backend::Redis(redis)
            }
            Err(err) => {
                tracing::warn!(
                    backend = %BackendKind::Memory,
                    error = %err,
                    "shared cache backend unavailable, falling back to in-process cache for this process"
                );
                Backend::Memory(MemoryBackend::new())
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Redis(_) => BackendKind::Redis,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }

    /// Sweep expired entries. Redis expires keys itself, so only the
    /// in-memory backend has work to do.
    pub fn purge_expired(&self) -> usize {
        match self {
            Backend::Redis(_) => 0,
            Backend::Memory(memory) => memory.purge_expired(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

#[async_trait]
impl StorageBackend for Backend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        match self {
            Backend::Redis(b) => b.get(key).await,
            Backend::Memory(b) => b.get(key).await,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        match self {
            Backend::Redis(b) => b.set_with_ttl(key, value, ttl).await,
            Backend::Memory(b) => b.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        match self {
            Backend::Redis(b) => b.delete(keys).await,
            Backend::Memory(b) => b.delete(keys).await,
        }
    }

    async fn tag_add_member(&self, tag: &str, key: &str) -> Result<(), Error> {
        match self {
            Backend::Redis(b) => b.tag_add_member(tag, key).await,
            Backend::Memory(b) => b.tag_add_member(tag, key).await,
        }
    }

    async fn tag_members(&self, tag: &str) -> Result<Vec<String>, Error> {
        match self {
            Backend::Redis(b) => b.tag_members(tag).await,
            Backend::Memory(b) => b.tag_members(tag).await,
        }
    }

    async fn tag_expire(&self, tag: &str, ttl: Duration) -> Result<(), Error> {
        match self {
            Backend::Redis(b) => b.tag_expire(tag, ttl).await,
            Backend::Memory(b) => b.tag_expire(tag, ttl).await,
        }
    }

    async fn tag_delete(&self, tag: &str) -> Result<(), Error> {
        match self {
            Backend::Redis(b) => b.tag_delete(tag).await,
            Backend::Memory(b) => b.tag_delete(tag).await,
        }
    }
}
