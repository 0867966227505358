//! Structured errors for the postcache server.
//!
//! Every tool failure maps to a JSON-RPC error code. Cache trouble never
//! shows up here; only bad input and upstream failures on a miss do.

use postcache_client::UpstreamError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for the postcache server.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g. empty post id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Nothing cached under the requested key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The upstream has no such resource.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The upstream rejected our credentials.
    #[error("UPSTREAM_AUTH: {0}")]
    UpstreamAuth(String),

    /// The upstream asked us to slow down.
    #[error("UPSTREAM_RATE_LIMITED: {0}")]
    UpstreamRateLimited(String),

    /// The upstream did not answer in time.
    #[error("UPSTREAM_TIMEOUT: {0}")]
    UpstreamTimeout(String),

    /// Any other upstream failure.
    #[error("UPSTREAM_ERROR: {0}")]
    Upstream(String),
}

impl From<UpstreamError> for ToolError {
    fn from(err: UpstreamError) -> Self {
        let message = err.to_string();
        match err {
            UpstreamError::InvalidRequest(msg) => ToolError::InvalidInput(msg),
            UpstreamError::NotFound(_) => ToolError::NotFound(message),
            UpstreamError::AuthError => ToolError::UpstreamAuth(message),
            UpstreamError::RateLimited => ToolError::UpstreamRateLimited(message),
            UpstreamError::Timeout => ToolError::UpstreamTimeout(message),
            UpstreamError::HttpError { .. } | UpstreamError::Network(_) | UpstreamError::Parse(_) => {
                ToolError::Upstream(message)
            }
        }
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::CacheMiss(_) => -32001,
            ToolError::NotFound(_) => -32002,
            ToolError::UpstreamTimeout(_) => -32006,
            ToolError::Upstream(_) => -32008,
            ToolError::UpstreamAuth(_) => -32009,
            ToolError::UpstreamRateLimited(_) => -32010,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
