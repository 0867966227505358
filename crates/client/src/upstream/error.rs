//! Upstream content API error types.

use std::sync::Arc;

/// Errors from the upstream content API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// The requested post does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: upstream rejected the API key")]
    AuthError,

    /// Rate limited by the upstream.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Request parameters rejected before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { UpstreamError::Timeout } else { UpstreamError::Network(Arc::new(err)) }
    }
}

impl From<UpstreamError> for postcache_core::Error {
    fn from(err: UpstreamError) -> Self {
        postcache_core::Error::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UpstreamError::NotFound("post-9".to_string());
        assert!(err.to_string().contains("post-9"));

        let err = UpstreamError::HttpError { status: 503 };
        assert_eq!(err.to_string(), "HTTP error: 503");
    }

    #[test]
    fn test_into_core_error() {
        let err: postcache_core::Error = UpstreamError::RateLimited.into();
        assert!(matches!(err, postcache_core::Error::Upstream(ref msg) if msg.contains("rate limited")));
        assert_eq!(err.code(), "UPSTREAM_ERROR");
    }
}
