//! posts_list tool implementation.
//!
//! Returns one page of posts, read through the cache.

use std::sync::Arc;

use postcache_client::{ListRequest, PostPage};
use postcache_core::Visibility;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Served, json_result, serve_hit};
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the posts_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostsListParams {
    /// Page number, starting at 1 (default 1).
    #[serde(default)]
    pub page: Option<u32>,

    /// Page size, 1-100 (default 20).
    #[serde(default)]
    pub per_page: Option<u32>,

    /// `public` (default) or `all` to include hidden and draft posts.
    #[serde(default)]
    pub visibility: Option<String>,

    /// Sort clauses in priority order, `-` prefix for descending.
    #[serde(default)]
    pub sort: Vec<String>,

    /// Only posts by this author.
    #[serde(default)]
    pub author_id: Option<String>,

    /// Only posts with this topic tag.
    #[serde(default)]
    pub tag: Option<String>,

    /// Skip the cache read and fetch from upstream.
    #[serde(default)]
    pub force_refresh: bool,
}

impl TryFrom<PostsListParams> for ListRequest {
    type Error = ToolError;

    fn try_from(params: PostsListParams) -> Result<Self, Self::Error> {
        let visibility = match params.visibility.as_deref() {
            Some("public") | None => Visibility::Public,
            Some("all") => Visibility::All,
            Some(other) => return Err(ToolError::InvalidInput(format!("invalid visibility: {other}"))),
        };

        let defaults = ListRequest::default();
        let req = ListRequest {
            page: params.page.unwrap_or(defaults.page),
            per_page: params.per_page.unwrap_or(defaults.per_page),
            visibility,
            sort: params.sort,
            author_id: params.author_id,
            tag: params.tag,
        };
        req.validate()?;
        Ok(req)
    }
}

/// Implementation of the posts_list tool.
pub async fn posts_list_impl(state: &AppState, params: PostsListParams) -> Result<CallToolResult, McpError> {
    let force_refresh = params.force_refresh;
    let req = ListRequest::try_from(params)?;
    let scope = req.cache_scope();
    let cache_params = req.cache_params();
    let cache = state.cache().await;

    if !force_refresh && let Some(entry) = cache.read_list::<PostPage>(&scope, &cache_params).await {
        let key = cache.list_key(&scope, &cache_params);
        let source = Arc::clone(state.source());
        let writer = cache.clone();

        let served = serve_hit(cache, &key, entry, state.stale_after(), move || async move {
            let page = source.fetch_list(&req).await?;
            writer.write_list(&req.cache_scope(), &req.cache_params(), &page).await;
            Ok(())
        });
        return json_result(&served);
    }

    let page = state.source().fetch_list(&req).await.map_err(ToolError::from)?;
    let cached_at = cache.write_list(&scope, &cache_params, &page).await;
    json_result(&Served::fetched(page, cached_at, force_refresh))
}
