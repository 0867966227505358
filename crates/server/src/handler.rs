//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::state::AppState;
use crate::tools::cache::{CacheGetParams, CacheInvalidateParams, get_impl, invalidate_impl};
use crate::tools::comment_create::{CommentCreateParams, comment_create_impl};
use crate::tools::post_comments::{PostCommentsParams, post_comments_impl};
use crate::tools::post_get::{PostGetParams, post_get_impl};
use crate::tools::posts_list::{PostsListParams, posts_list_impl};

/// The main MCP server handler for postcache.
#[derive(Clone)]
pub struct PostcacheServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PostcacheServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(
        description = "List blog posts, one page at a time. Served from cache when possible; stale pages are returned immediately and refreshed in the background."
    )]
    async fn posts_list(&self, params: Parameters<PostsListParams>) -> Result<CallToolResult, McpError> {
        posts_list_impl(&self.state, params.0).await
    }

    #[tool(description = "Get a single blog post by id, read through the cache.")]
    async fn post_get(&self, params: Parameters<PostGetParams>) -> Result<CallToolResult, McpError> {
        post_get_impl(&self.state, params.0).await
    }

    #[tool(description = "Get the comment thread of a blog post, read through the cache.")]
    async fn post_comments(&self, params: Parameters<PostCommentsParams>) -> Result<CallToolResult, McpError> {
        post_comments_impl(&self.state, params.0).await
    }

    #[tool(description = "Add a comment to a blog post, then evict the cached post, its comments, and all list pages.")]
    async fn comment_create(&self, params: Parameters<CommentCreateParams>) -> Result<CallToolResult, McpError> {
        comment_create_impl(&self.state, params.0).await
    }

    #[tool(description = "Inspect the raw cached envelope stored under a cache key.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }

    #[tool(description = "Evict cached entries by tag, post id, or author id. Returns the number of evicted keys.")]
    async fn cache_invalidate(&self, params: Parameters<CacheInvalidateParams>) -> Result<CallToolResult, McpError> {
        invalidate_impl(&self.state, params.0).await
    }
}

impl ServerHandler for PostcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "postcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
