//! post_comments tool implementation.
//!
//! Returns the comment thread of a post, read through the cache.

use std::sync::Arc;

use postcache_client::CommentThread;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Served, json_result, require_id, serve_hit};
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the post_comments tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostCommentsParams {
    /// Id of the post whose comments to return.
    pub post_id: String,

    /// Skip the cache read and fetch from upstream.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Implementation of the post_comments tool.
pub async fn post_comments_impl(state: &AppState, params: PostCommentsParams) -> Result<CallToolResult, McpError> {
    require_id("post_id", &params.post_id)?;
    let cache = state.cache().await;

    if !params.force_refresh
        && let Some(entry) = cache.read_comments::<CommentThread>(&params.post_id).await
    {
        let key = cache.comments_key(&params.post_id);
        let source = Arc::clone(state.source());
        let writer = cache.clone();
        let post_id = params.post_id.clone();

        let served = serve_hit(cache, &key, entry, state.stale_after(), move || async move {
            let thread = source.fetch_comments(&post_id).await?;
            writer.write_comments(&post_id, &thread).await;
            Ok(())
        });
        return json_result(&served);
    }

    let thread = state
        .source()
        .fetch_comments(&params.post_id)
        .await
        .map_err(ToolError::from)?;
    let cached_at = cache.write_comments(&params.post_id, &thread).await;
    json_result(&Served::fetched(thread, cached_at, params.force_refresh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::CacheStatus;
    use crate::tools::testing::{FakeSource, parse, state};

    fn params(post_id: &str) -> PostCommentsParams {
        PostCommentsParams { post_id: post_id.into(), force_refresh: false }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let source = FakeSource::with_posts(&[("post-9", "42")]);
        let state = state(Arc::clone(&source), 30);

        let first: Served<CommentThread> = parse(post_comments_impl(&state, params("post-9")).await.unwrap());
        assert_eq!(first.cache.status, CacheStatus::Miss);
        assert!(first.data.is_empty());

        let second: Served<CommentThread> = parse(post_comments_impl(&state, params("post-9")).await.unwrap());
        assert_eq!(second.cache.status, CacheStatus::Hit);
        assert_eq!(FakeSource::calls(&source.comment_calls), 1);
    }

    #[tokio::test]
    async fn test_comments_and_post_are_separate_entries() {
        let source = FakeSource::with_posts(&[("post-9", "42")]);
        let state = state(Arc::clone(&source), 30);
        post_comments_impl(&state, params("post-9")).await.unwrap();

        state.cache().await.invalidate_item("post-9").await;

        let again: Served<CommentThread> = parse(post_comments_impl(&state, params("post-9")).await.unwrap());
        assert_eq!(again.cache.status, CacheStatus::Hit);
    }
}
