//! cache_invalidate tool implementation.
//!
//! Evicts cache entries by tag, post, or author.

use postcache_core::Tag;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_invalidate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateParams {
    /// Raw tags, e.g. `all-lists`, `author:42`, `item:post-9`, `comments:post-9`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Evict this post and every list page.
    #[serde(default)]
    pub post_id: Option<String>,

    /// Evict every page and post by this author.
    #[serde(default)]
    pub author_id: Option<String>,

    /// Also sweep expired records from the in-process backend.
    #[serde(default)]
    pub purge_expired: bool,
}

/// Output from the cache_invalidate tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInvalidateOutput {
    /// Keys evicted by tag, post, or author.
    pub evicted: usize,
    /// Expired records swept.
    pub purged: usize,
    pub backend: String,
}

/// Implementation of the cache_invalidate tool.
pub async fn invalidate_impl(state: &AppState, params: CacheInvalidateParams) -> Result<CallToolResult, McpError> {
    if params.tags.is_empty() && params.post_id.is_none() && params.author_id.is_none() && !params.purge_expired {
        return Err(ToolError::InvalidInput(
            "At least one of tags, post_id, author_id, or purge_expired must be specified".to_string(),
        )
        .into());
    }

    if params.tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(ToolError::InvalidInput("tags cannot contain empty strings".to_string()).into());
    }

    let cache = state.cache().await;
    let mut evicted = 0;

    if !params.tags.is_empty() {
        let tags: Vec<Tag> = params.tags.into_iter().map(Tag::new).collect();
        evicted += cache.invalidate_tags(&tags).await;
    }

    if let Some(post_id) = &params.post_id {
        evicted += cache.invalidate_item_and_lists(post_id).await;
    }

    if let Some(author_id) = &params.author_id {
        evicted += cache.invalidate_author(author_id).await;
    }

    let purged = if params.purge_expired { cache.purge_expired() } else { 0 };

    let output = CacheInvalidateOutput { evicted, purged, backend: cache.backend_kind().to_string() };
    json_result(&output)
}
