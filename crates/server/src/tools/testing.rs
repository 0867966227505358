//! In-memory `ContentSource` for tool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use postcache_client::{
    Comment, CommentThread, ContentSource, ListRequest, NewComment, Post, PostPage, PostSummary, UpstreamError,
};
use postcache_core::{AppConfig, CacheService, CacheSettings};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;

use crate::state::AppState;

/// Upstream fake that counts calls per endpoint.
#[derive(Default)]
pub struct FakeSource {
    posts: Mutex<HashMap<String, Post>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    pub list_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    /// When set, every call fails with HTTP 503.
    pub failing: AtomicBool,
    /// Artificial latency per call.
    pub delay: Mutex<Duration>,
}

impl FakeSource {
    pub fn with_posts(posts: &[(&str, &str)]) -> Arc<Self> {
        let source = Self::default();
        for (id, author) in posts {
            source.put_post(post(id, author));
        }
        Arc::new(source)
    }

    pub fn put_post(&self, post: Post) {
        self.posts.lock().unwrap().insert(post.id.clone(), post);
    }

    pub fn rename(&self, id: &str, title: &str) {
        if let Some(post) = self.posts.lock().unwrap().get_mut(id) {
            post.title = title.to_string();
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<(), UpstreamError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::HttpError { status: 503 });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_list(&self, req: &ListRequest) -> Result<PostPage, UpstreamError> {
        self.enter(&self.list_calls).await?;
        let posts = self.posts.lock().unwrap();
        let mut items: Vec<PostSummary> = posts
            .values()
            .filter(|p| req.author_id.is_none() || p.author_id == req.author_id)
            .map(|p| PostSummary {
                id: p.id.clone(),
                author_id: p.author_id.clone(),
                title: p.title.clone(),
                excerpt: String::new(),
                published_at: p.published_at,
                comment_count: p.comment_count,
                reaction_count: p.reaction_count,
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        let total = items.len() as u64;
        let start = ((req.page - 1) * req.per_page) as usize;
        let items = items.into_iter().skip(start).take(req.per_page as usize).collect();
        Ok(PostPage { items, page: req.page, per_page: req.per_page, total })
    }

    async fn fetch_post(&self, id: &str) -> Result<Post, UpstreamError> {
        self.enter(&self.post_calls).await?;
        self.posts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("post {id}")))
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<CommentThread, UpstreamError> {
        self.enter(&self.comment_calls).await?;
        if !self.posts.lock().unwrap().contains_key(post_id) {
            return Err(UpstreamError::NotFound(format!("post {post_id}")));
        }
        let comments = self.comments.lock().unwrap().get(post_id).cloned().unwrap_or_default();
        Ok(CommentThread { post_id: post_id.to_string(), comments })
    }

    async fn create_comment(&self, post_id: &str, comment: &NewComment) -> Result<Comment, UpstreamError> {
        self.enter(&self.create_calls).await?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .get_mut(post_id)
            .ok_or_else(|| UpstreamError::NotFound(format!("post {post_id}")))?;
        post.comment_count += 1;

        let mut comments = self.comments.lock().unwrap();
        let thread = comments.entry(post_id.to_string()).or_default();
        let created = Comment {
            id: format!("c-{}", thread.len() + 1),
            post_id: post_id.to_string(),
            author_id: Some(comment.author_id.clone()),
            body: comment.body.clone(),
            created_at: Utc::now(),
        };
        thread.push(created.clone());
        Ok(created)
    }
}

pub fn post(id: &str, author: &str) -> Post {
    Post {
        id: id.to_string(),
        author_id: Some(author.to_string()),
        author_name: None,
        title: format!("Title of {id}"),
        slug: id.to_string(),
        body: String::new(),
        tags: Vec::new(),
        published_at: None,
        updated_at: None,
        comment_count: 0,
        reaction_count: 0,
    }
}

/// State on the in-memory backend with the given stale threshold.
pub fn state(source: Arc<FakeSource>, stale_after_secs: u64) -> AppState {
    let config = AppConfig { stale_after_secs, ..Default::default() };
    let cache = CacheService::in_memory(CacheSettings::from(&config));
    AppState::with_cache(config, source, cache)
}

/// Decode the JSON text of a successful tool result.
pub fn parse<T: DeserializeOwned>(result: CallToolResult) -> T {
    let text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone())
        .expect("tool result has no text content");
    serde_json::from_str(&text).expect("tool result is not valid JSON")
}
