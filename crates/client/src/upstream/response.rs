//! Upstream content API payload types.
//!
//! These are both the wire format of the upstream and the cached payloads, so
//! they round-trip through serde unchanged. camelCase aliases accept the
//! upstream's older field names.

use chrono::{DateTime, Utc};
use postcache_core::{ItemPayload, ListPayload};
use serde::{Deserialize, Serialize};

use super::UpstreamError;

/// Longest comment body the upstream accepts, in characters.
pub const MAX_COMMENT_CHARS: usize = 10_000;

/// A full post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default, alias = "authorId")]
    pub author_id: Option<String>,
    #[serde(default, alias = "authorName")]
    pub author_name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "commentCount")]
    pub comment_count: u32,
    #[serde(default, alias = "reactionCount")]
    pub reaction_count: u32,
}

/// Post preview as embedded in list pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    #[serde(default, alias = "authorId")]
    pub author_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default, alias = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "commentCount")]
    pub comment_count: u32,
    #[serde(default, alias = "reactionCount")]
    pub reaction_count: u32,
}

/// One page of a post listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub items: Vec<PostSummary>,
    pub page: u32,
    #[serde(alias = "perPage")]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(alias = "postId")]
    pub post_id: String,
    #[serde(default, alias = "authorId")]
    pub author_id: Option<String>,
    pub body: String,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// All comments of one post, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(alias = "postId")]
    pub post_id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl CommentThread {
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

/// Body of `POST /posts/{id}/comments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub author_id: String,
    pub body: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), UpstreamError> {
        if self.author_id.trim().is_empty() {
            return Err(UpstreamError::InvalidRequest("author_id cannot be empty".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(UpstreamError::InvalidRequest("comment body cannot be empty".to_string()));
        }
        let chars = self.body.chars().count();
        if chars > MAX_COMMENT_CHARS {
            return Err(UpstreamError::InvalidRequest(format!(
                "comment too long: {chars} chars (max {MAX_COMMENT_CHARS})"
            )));
        }
        Ok(())
    }
}

impl ListPayload for PostPage {
    fn author_ids(&self) -> Vec<String> {
        self.items.iter().filter_map(|item| item.author_id.clone()).collect()
    }
}

impl ItemPayload for Post {
    fn author_id(&self) -> Option<String> {
        self.author_id.clone()
    }
}
