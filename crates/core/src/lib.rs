//! Core types and shared functionality for postcache.
//!
//! This crate provides:
//! - Tag-indexed response cache with Redis and in-process backends
//! - Single-flight background revalidation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    Backend, BackendKind, CacheEntry, CacheKey, CacheService, CacheSettings, ItemPayload, ListPayload, ListScope,
    RevalidationOutcome, Tag, Visibility,
};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
