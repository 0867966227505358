//! MCP tool implementations.
//!
//! Read tools follow one flow: serve a fresh hit as is, serve a stale hit
//! immediately while a background refresh runs, and fall through to the
//! upstream on a miss (or when `force_refresh` is set), writing the result
//! back. Mutation tools go upstream first and invalidate afterwards.

pub mod cache;
pub mod comment_create;
pub mod post_comments;
pub mod post_get;
pub mod posts_list;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use postcache_core::{CacheEntry, CacheKey, CacheService};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// How a read was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Cached and younger than the stale threshold.
    Hit,
    /// Cached but old; a background refresh was triggered.
    Stale,
    /// Not cached; fetched upstream.
    Miss,
    /// Cache skipped on request; fetched upstream.
    Bypass,
}

/// Cache metadata attached to every read result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub status: CacheStatus,
    pub cached_at: DateTime<Utc>,
    pub age_secs: u64,
    /// Whether this hit was stale and started or joined a background refresh.
    pub revalidating: bool,
}

/// Tool output: the payload plus how it was served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Served<T> {
    pub data: T,
    pub cache: CacheMeta,
}

impl<T> Served<T> {
    /// Data that was just fetched upstream and written at `cached_at`.
    pub fn fetched(data: T, cached_at: DateTime<Utc>, bypass: bool) -> Self {
        let status = if bypass { CacheStatus::Bypass } else { CacheStatus::Miss };
        Self { data, cache: CacheMeta { status, cached_at, age_secs: 0, revalidating: false } }
    }
}

/// Turn a cache hit into a response, refreshing `key` in the background when
/// the entry is older than `stale_after`.
///
/// The refresh is never awaited here. Concurrent stale hits on one key share
/// one refresh.
pub(crate) fn serve_hit<T, F, Fut>(
    cache: &CacheService, key: &CacheKey, entry: CacheEntry<T>, stale_after: Duration, refresh: F,
) -> Served<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), postcache_core::Error>> + Send + 'static,
{
    let age_secs = entry.age().as_secs();
    let stale = entry.is_stale(stale_after);

    if stale {
        tracing::debug!(key = %key, age_secs, "stale hit, revalidating");
        drop(cache.revalidate(key, refresh));
    }

    let status = if stale { CacheStatus::Stale } else { CacheStatus::Hit };
    Served {
        data: entry.data,
        cache: CacheMeta { status, cached_at: entry.cached_at, age_secs, revalidating: stale },
    }
}

/// Pretty JSON text result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Reject blank identifiers before they reach a cache key or a URL.
pub(crate) fn require_id(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(())
}
