//! post_get tool implementation.
//!
//! Returns one post, read through the cache.

use std::sync::Arc;

use postcache_client::Post;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Served, json_result, require_id, serve_hit};
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the post_get tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostGetParams {
    /// Post id.
    pub id: String,

    /// Skip the cache read and fetch from upstream.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Implementation of the post_get tool.
pub async fn post_get_impl(state: &AppState, params: PostGetParams) -> Result<CallToolResult, McpError> {
    require_id("id", &params.id)?;
    let cache = state.cache().await;

    if !params.force_refresh
        && let Some(entry) = cache.read_item::<Post>(&params.id).await
    {
        let key = cache.item_key(&params.id);
        let source = Arc::clone(state.source());
        let writer = cache.clone();
        let id = params.id.clone();

        let served = serve_hit(cache, &key, entry, state.stale_after(), move || async move {
            let post = source.fetch_post(&id).await?;
            writer.write_item(&id, &post).await;
            Ok(())
        });
        return json_result(&served);
    }

    let post = state.source().fetch_post(&params.id).await.map_err(ToolError::from)?;
    let cached_at = cache.write_item(&params.id, &post).await;
    json_result(&Served::fetched(post, cached_at, params.force_refresh))
}
