//! Upstream content API client.
//!
//! The upstream is a slow, rate-limited JSON API for posts and comments. Every
//! cache miss and every background refresh lands here.
//!
//! ### Endpoints
//!
//! - `GET  {base}/posts?page=&per_page=&visibility=&sort=&author_id=&tag=`
//! - `GET  {base}/posts/{id}`
//! - `GET  {base}/posts/{id}/comments`
//! - `POST {base}/posts/{id}/comments`
//!
//! Authentication is an optional `Authorization: Bearer` key. Requests are
//! spaced by a minimum interval so a burst of misses cannot trip the
//! upstream's own limiter.

pub mod error;
pub mod request;
pub mod response;

pub use error::UpstreamError;
pub use request::ListRequest;
pub use response::{Comment, CommentThread, NewComment, Post, PostPage, PostSummary};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use postcache_core::AppConfig;
use reqwest::{Method, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

/// Default base URL of the upstream API.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "postcache/0.1";

/// Default spacing between upstream requests.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Anything that can produce fresh content for the cache.
///
/// Implemented by [`ContentClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_list(&self, req: &ListRequest) -> Result<PostPage, UpstreamError>;

    async fn fetch_post(&self, id: &str) -> Result<Post, UpstreamError>;

    async fn fetch_comments(&self, post_id: &str) -> Result<CommentThread, UpstreamError>;

    async fn create_comment(&self, post_id: &str, comment: &NewComment) -> Result<Comment, UpstreamError>;
}

/// Upstream client configuration.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Bearer key, if the upstream requires one.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    /// Minimum spacing between two requests.
    pub min_interval: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl From<&AppConfig> for ContentConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.upstream_base_url.trim_end_matches('/').to_string(),
            api_key: config.upstream_api_key.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            min_interval: config.min_request_interval(),
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// HTTP client for the upstream content API.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    config: ContentConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl ContentClient {
    pub fn new(config: ContentConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpstreamError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_interval));
        Ok(Self { http, config, rate_limiter })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, UpstreamError> {
        Self::new(ContentConfig::from(config))
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        let mut builder = self.http.request(method, url).header(header::ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Send `builder` after the rate limiter allows it and decode a JSON body.
    ///
    /// `resource` names the thing being fetched in `NotFound` errors.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, resource: &str) -> Result<T, UpstreamError> {
        self.rate_limiter.acquire().await;
        let start = Instant::now();

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(
            resource,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "upstream response"
        );

        check_status(status, resource)?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Parse(e.to_string()))
    }
}

fn check_status(status: StatusCode, resource: &str) -> Result<(), UpstreamError> {
    match status {
        StatusCode::NOT_FOUND => Err(UpstreamError::NotFound(resource.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(UpstreamError::AuthError),
        StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
        s if s.is_client_error() || s.is_server_error() => Err(UpstreamError::HttpError { status: s.as_u16() }),
        _ => Ok(()),
    }
}

fn post_path(id: &str) -> String {
    format!("/posts/{}", url::form_urlencoded::byte_serialize(id.as_bytes()).collect::<String>())
}

#[async_trait]
impl ContentSource for ContentClient {
    async fn fetch_list(&self, req: &ListRequest) -> Result<PostPage, UpstreamError> {
        req.validate()?;
        let builder = self.request(Method::GET, "/posts").query(&req.query_pairs());
        self.send(builder, "posts").await
    }

    async fn fetch_post(&self, id: &str) -> Result<Post, UpstreamError> {
        let builder = self.request(Method::GET, &post_path(id));
        self.send(builder, &format!("post {id}")).await
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<CommentThread, UpstreamError> {
        let builder = self.request(Method::GET, &format!("{}/comments", post_path(post_id)));
        self.send(builder, &format!("post {post_id}")).await
    }

    async fn create_comment(&self, post_id: &str, comment: &NewComment) -> Result<Comment, UpstreamError> {
        comment.validate()?;
        let builder = self.request(Method::POST, &format!("{}/comments", post_path(post_id))).json(comment);
        self.send(builder, &format!("post {post_id}")).await
    }
}
