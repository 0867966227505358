//! Upstream content API client for postcache.
//!
//! This crate provides the HTTP client the server falls through to on cache
//! misses and background refreshes, plus the payload types that get cached.

pub mod upstream;

pub use upstream::{
    Comment, CommentThread, ContentClient, ContentConfig, ContentSource, ListRequest, NewComment, Post, PostPage,
    PostSummary, UpstreamError,
};
