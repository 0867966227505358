//! cache_get tool implementation.
//!
//! Returns the raw envelope stored under a cache key.

use chrono::{DateTime, Utc};
use postcache_core::CacheKey;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Full cache key, e.g. `postcache:cache:blog:item:post-9:<hash>`.
    pub key: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheGetOutput {
    pub key: String,
    pub backend: String,
    pub cached_at: DateTime<Utc>,
    pub age_secs: u64,
    pub data: serde_json::Value,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &AppState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.key.trim().is_empty() {
        return Err(ToolError::InvalidInput("key cannot be empty".to_string()).into());
    }

    let cache = state.cache().await;
    let key = CacheKey::from_raw(params.key);
    let entry = cache
        .read_raw(&key)
        .await
        .ok_or_else(|| ToolError::CacheMiss(key.to_string()))?;

    let output = CacheGetOutput {
        key: key.to_string(),
        backend: cache.backend_kind().to_string(),
        age_secs: entry.age().as_secs(),
        cached_at: entry.cached_at,
        data: entry.data,
    };
    json_result(&output)
}
