//! comment_create tool implementation.
//!
//! Posts a comment upstream, then evicts everything that embeds the post's
//! comments or comment count. Invalidation only happens after the upstream
//! accepted the write, so a concurrent read cannot repopulate the cache with
//! the pre-comment state.

use postcache_client::{Comment, NewComment};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{json_result, require_id};
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the comment_create tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CommentCreateParams {
    /// Post to comment on.
    pub post_id: String,

    /// Commenting user.
    pub author_id: String,

    /// Comment text (max 10000 characters).
    pub body: String,
}

/// Output from the comment_create tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreateOutput {
    pub comment: Comment,
    /// Cache keys evicted as a consequence.
    pub evicted: usize,
}

/// Implementation of the comment_create tool.
pub async fn comment_create_impl(state: &AppState, params: CommentCreateParams) -> Result<CallToolResult, McpError> {
    require_id("post_id", &params.post_id)?;
    let new_comment = NewComment { author_id: params.author_id, body: params.body };
    new_comment.validate().map_err(ToolError::from)?;

    let comment = state
        .source()
        .create_comment(&params.post_id, &new_comment)
        .await
        .map_err(ToolError::from)?;

    let cache = state.cache().await;
    let evicted = cache.invalidate_comments(&params.post_id).await
        + cache.invalidate_item_and_lists(&params.post_id).await;
    tracing::debug!(post_id = %params.post_id, evicted, "comment created");

    json_result(&CommentCreateOutput { comment, evicted })
}
