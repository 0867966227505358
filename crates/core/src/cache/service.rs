//! Cache facade for lists, posts and comment threads.
//!
//! `CacheService` is built once at startup and cloned into every consumer.
//! Reads return `None` on a miss, a corrupt payload, or a backend error;
//! writes and invalidations log failures and carry on. Nothing here fails a
//! request: the worst case is a trip to the upstream.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::backend::{Backend, BackendKind, MemoryBackend, StorageBackend};
use super::entry::CacheEntry;
use super::key::{CacheKey, Tag, build_key};
use super::payload::{ItemPayload, ListPayload, ListScope};
use super::revalidate::{RevalidationCoordinator, RevalidationHandle};
use super::settings::CacheSettings;
use super::tags::TagIndex;
use crate::Error;

const KIND_LIST: &str = "list";
const KIND_ITEM: &str = "item";
const KIND_COMMENTS: &str = "comments";

struct Inner {
    backend: Arc<Backend>,
    tags: TagIndex,
    revalidator: RevalidationCoordinator,
    settings: CacheSettings,
}

/// Tag-indexed read-through cache.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<Inner>,
}

impl CacheService {
    /// Select a backend per `settings` and build the service around it.
    ///
    /// Never fails: an unreachable Redis degrades to the in-process backend.
    pub async fn connect(settings: CacheSettings) -> Self {
        let backend = Backend::select(&settings).await;
        Self::with_backend(backend, settings)
    }

    /// Service on the in-process backend regardless of `settings.redis_url`.
    pub fn in_memory(settings: CacheSettings) -> Self {
        Self::with_backend(Backend::Memory(MemoryBackend::new()), settings)
    }

    pub fn with_backend(backend: Backend, settings: CacheSettings) -> Self {
        let backend = Arc::new(backend);
        let tags = TagIndex::new(Arc::clone(&backend), settings.key_prefix.clone());
        Self { inner: Arc::new(Inner { backend, tags, revalidator: RevalidationCoordinator::new(), settings }) }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Key of a list page: pagination and visibility as discriminators,
    /// sort and filter clauses hashed from `params`.
    pub fn list_key(&self, scope: &ListScope, params: &Value) -> CacheKey {
        let page = scope.page.to_string();
        let per_page = scope.per_page.to_string();
        let visibility = scope.visibility.to_string();
        self.key(KIND_LIST, &[&page, &per_page, &visibility], params)
    }

    pub fn item_key(&self, id: &str) -> CacheKey {
        self.key(KIND_ITEM, &[id], &Value::Object(Default::default()))
    }

    pub fn comments_key(&self, item_id: &str) -> CacheKey {
        self.key(KIND_COMMENTS, &[item_id], &Value::Object(Default::default()))
    }

    fn key(&self, kind: &str, discriminators: &[&str], params: &Value) -> CacheKey {
        let settings = &self.inner.settings;
        build_key(&settings.key_prefix, &settings.domain, kind, discriminators, params)
    }

    pub async fn read_list<T: DeserializeOwned>(&self, scope: &ListScope, params: &Value) -> Option<CacheEntry<T>> {
        self.read(&self.list_key(scope, params)).await
    }

    pub async fn read_item<T: DeserializeOwned>(&self, id: &str) -> Option<CacheEntry<T>> {
        self.read(&self.item_key(id)).await
    }

    pub async fn read_comments<T: DeserializeOwned>(&self, item_id: &str) -> Option<CacheEntry<T>> {
        self.read(&self.comments_key(item_id)).await
    }

    /// Untyped read for inspection tooling.
    pub async fn read_raw(&self, key: &CacheKey) -> Option<CacheEntry<Value>> {
        self.read(key).await
    }

    /// Typed read. Misses, backend errors and payloads that do not decode as
    /// `CacheEntry<T>` all come back as `None`.
    pub async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let bytes = match self.inner.backend.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Err(err) => {
                tracing::warn!(key = %key, op = "get", code = err.code(), error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry<T>>(&bytes) {
            Ok(entry) => {
                tracing::debug!(key = %key, "cache hit");
                Some(entry)
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "undecodable cache payload, treating as miss");
                None
            }
        }
    }

    /// Cache a list page under `all-lists` plus one `author:{id}` tag per
    /// distinct author on the page. Returns the envelope timestamp.
    pub async fn write_list<T>(&self, scope: &ListScope, params: &Value, data: &T) -> DateTime<Utc>
    where
        T: Serialize + ListPayload + Sync,
    {
        let mut authors = data.author_ids();
        authors.sort();
        authors.dedup();

        let mut tags = Vec::with_capacity(authors.len() + 1);
        tags.push(Tag::all_lists());
        tags.extend(authors.iter().map(|author| Tag::author(author)));

        let key = self.list_key(scope, params);
        self.write(&key, data, self.inner.settings.list_ttl, &tags).await
    }

    /// Cache a post under `item:{id}` and, when known, `author:{id}`.
    pub async fn write_item<T>(&self, id: &str, data: &T) -> DateTime<Utc>
    where
        T: Serialize + ItemPayload + Sync,
    {
        let mut tags = vec![Tag::item(id)];
        if let Some(author) = data.author_id() {
            tags.push(Tag::author(&author));
        }

        let key = self.item_key(id);
        self.write(&key, data, self.inner.settings.item_ttl, &tags).await
    }

    /// Cache a comment thread under `comments:{id}`.
    pub async fn write_comments<T: Serialize + Sync>(&self, item_id: &str, data: &T) -> DateTime<Utc> {
        let key = self.comments_key(item_id);
        self.write(&key, data, self.inner.settings.comments_ttl, &[Tag::comments(item_id)]).await
    }

    async fn write<T: Serialize + Sync>(&self, key: &CacheKey, data: &T, ttl: Duration, tags: &[Tag]) -> DateTime<Utc> {
        let entry = CacheEntry::new(data);
        if let Err(err) = self.inner.tags.write_tagged(key, &entry, ttl, tags).await {
            tracing::warn!(key = %key, op = "write", code = err.code(), error = %err, "cache write failed");
        }
        entry.cached_at
    }

    /// Evict every key under `tags`. Returns the number of keys listed, or 0
    /// when the backend failed (logged; entries then expire by TTL).
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        match self.inner.tags.invalidate_tags(tags).await {
            Ok(evicted) => evicted,
            Err(err) => {
                tracing::warn!(tags = ?tags, op = "invalidate", code = err.code(), error = %err, "cache invalidation failed");
                0
            }
        }
    }

    pub async fn invalidate_item(&self, id: &str) -> usize {
        self.invalidate_tags(&[Tag::item(id)]).await
    }

    /// Evict a post and every list page, after any mutation that changes
    /// both the post body and the previews embedded in lists.
    pub async fn invalidate_item_and_lists(&self, id: &str) -> usize {
        self.invalidate_tags(&[Tag::item(id), Tag::all_lists()]).await
    }

    pub async fn invalidate_author(&self, author_id: &str) -> usize {
        self.invalidate_tags(&[Tag::author(author_id)]).await
    }

    pub async fn invalidate_comments(&self, item_id: &str) -> usize {
        self.invalidate_tags(&[Tag::comments(item_id)]).await
    }

    /// Drop expired records from the in-process backend.
    pub fn purge_expired(&self) -> usize {
        self.inner.backend.purge_expired()
    }

    /// Refresh `key` in the background, at most once at a time.
    ///
    /// The returned handle may be dropped; the refresh still runs. Failures
    /// are logged by the coordinator and never reach the caller as errors.
    pub fn revalidate<F, Fut>(&self, key: &CacheKey, task: F) -> RevalidationHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.inner.revalidator.run_exclusive(key.as_str(), task)
    }

    pub fn in_flight_revalidations(&self) -> usize {
        self.inner.revalidator.in_flight_count()
    }

    /// Wait up to `grace` for background refreshes. Returns how many were abandoned.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.inner.revalidator.shutdown(grace).await
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend_kind())
            .field("prefix", &self.inner.settings.key_prefix)
            .finish()
    }
}
