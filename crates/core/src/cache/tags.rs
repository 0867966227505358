//! Tag index on top of a storage backend.
//!
//! Every tagged write registers its key in one member set per tag and re-arms
//! the tag TTL, so a tag never outlives its newest member by more than one TTL
//! window. Invalidation resolves tags to keys, deletes the union in one batch,
//! then deletes the tag records themselves.
//!
//! A key that expires on its own stays listed in its tags until the tag is
//! invalidated or expires. Deleting an already-gone key is harmless.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::backend::{Backend, StorageBackend};
use super::entry::CacheEntry;
use super::key::{CacheKey, Tag, tag_storage_key};
use crate::Error;

/// Secondary index from tags to the cache keys they group.
#[derive(Debug, Clone)]
pub struct TagIndex {
    backend: Arc<Backend>,
    prefix: String,
}

impl TagIndex {
    pub fn new(backend: Arc<Backend>, prefix: impl Into<String>) -> Self {
        Self { backend, prefix: prefix.into() }
    }

    /// Store `entry` under `key` and register the key under every tag.
    ///
    /// # Errors
    ///
    /// Returns the first serialization or backend error. A failure after the
    /// entry itself was stored leaves it cached but missing from some tags;
    /// its own TTL still bounds that.
    pub async fn write_tagged<T: Serialize + Sync>(
        &self, key: &CacheKey, entry: &CacheEntry<T>, ttl: Duration, tags: &[Tag],
    ) -> Result<(), Error> {
        let bytes = serde_json::to_vec(entry)?;
        self.backend.set_with_ttl(key.as_str(), &bytes, ttl).await?;

        for tag in tags {
            let tag_key = tag_storage_key(&self.prefix, tag);
            self.backend.tag_add_member(&tag_key, key.as_str()).await?;
            self.backend.tag_expire(&tag_key, ttl).await?;
        }

        tracing::debug!(key = %key, tags = tags.len(), ttl_secs = ttl.as_secs(), "cache write");
        Ok(())
    }

    /// Evict every key registered under any of `tags`, then drop the tags.
    ///
    /// Idempotent: unknown or empty tags are fine. Returns how many distinct
    /// keys were listed across the tags.
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> Result<usize, Error> {
        let tag_keys: Vec<String> = tags.iter().map(|tag| tag_storage_key(&self.prefix, tag)).collect();

        let mut members = BTreeSet::new();
        for tag_key in &tag_keys {
            members.extend(self.backend.tag_members(tag_key).await?);
        }

        let members: Vec<String> = members.into_iter().collect();
        self.backend.delete(&members).await?;

        for tag_key in &tag_keys {
            self.backend.tag_delete(tag_key).await?;
        }

        tracing::debug!(tags = ?tags, evicted = members.len(), "tag invalidation");
        Ok(members.len())
    }

    /// Keys currently listed under `tag`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, if any.
    pub async fn members(&self, tag: &Tag) -> Result<Vec<CacheKey>, Error> {
        let members = self.backend.tag_members(&tag_storage_key(&self.prefix, tag)).await?;
        Ok(members.into_iter().map(CacheKey::from_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::cache::key::build_key;

    fn index() -> (TagIndex, Arc<Backend>) {
        let backend = Arc::new(Backend::Memory(MemoryBackend::new()));
        (TagIndex::new(Arc::clone(&backend), "test"), backend)
    }

    fn key(name: &str) -> CacheKey {
        build_key("test", "blog", "list", &[name], &json!({}))
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_write_registers_members() {
        let (index, backend) = index();
        let k = key("1");
        index
            .write_tagged(&k, &CacheEntry::new("page"), TTL, &[Tag::all_lists(), Tag::author("42")])
            .await
            .unwrap();

        assert!(backend.get(k.as_str()).await.unwrap().is_some());
        assert_eq!(index.members(&Tag::all_lists()).await.unwrap(), vec![k.clone()]);
        assert_eq!(index.members(&Tag::author("42")).await.unwrap(), vec![k]);
    }

    #[tokio::test]
    async fn test_invalidation_completeness() {
        let (index, backend) = index();
        let keys: Vec<CacheKey> = (0..5).map(|i| key(&i.to_string())).collect();
        for k in &keys {
            index.write_tagged(k, &CacheEntry::new(1), TTL, &[Tag::all_lists()]).await.unwrap();
        }

        let evicted = index.invalidate_tags(&[Tag::all_lists()]).await.unwrap();
        assert_eq!(evicted, 5);
        for k in &keys {
            assert!(backend.get(k.as_str()).await.unwrap().is_none());
        }
        assert!(index.members(&Tag::all_lists()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_isolation() {
        let (index, backend) = index();
        let page1 = key("1");
        let page2 = key("2");
        index
            .write_tagged(&page1, &CacheEntry::new(1), TTL, &[Tag::all_lists(), Tag::author("42")])
            .await
            .unwrap();
        index
            .write_tagged(&page2, &CacheEntry::new(2), TTL, &[Tag::all_lists(), Tag::author("7")])
            .await
            .unwrap();

        index.invalidate_tags(&[Tag::author("42")]).await.unwrap();

        assert!(backend.get(page1.as_str()).await.unwrap().is_none());
        assert!(backend.get(page2.as_str()).await.unwrap().is_some());
        // The surviving tag still lists the evicted key until it is invalidated itself.
        assert_eq!(index.members(&Tag::all_lists()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_union_deduplicates() {
        let (index, _) = index();
        let k = key("1");
        index
            .write_tagged(&k, &CacheEntry::new(1), TTL, &[Tag::item("post-9"), Tag::all_lists()])
            .await
            .unwrap();

        let evicted = index.invalidate_tags(&[Tag::item("post-9"), Tag::all_lists()]).await.unwrap();
        assert_eq!(evicted, 1);
    }

    #[tokio::test]
    async fn test_invalidation_idempotent() {
        let (index, _) = index();
        assert_eq!(index.invalidate_tags(&[Tag::author("nobody")]).await.unwrap(), 0);
        assert_eq!(index.invalidate_tags(&[Tag::author("nobody")]).await.unwrap(), 0);
        assert_eq!(index.invalidate_tags(&[]).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_ttl_rearmed_on_write() {
        let (index, _) = index();
        let first = key("1");
        let second = key("2");
        index.write_tagged(&first, &CacheEntry::new(1), TTL, &[Tag::all_lists()]).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        index.write_tagged(&second, &CacheEntry::new(2), TTL, &[Tag::all_lists()]).await.unwrap();

        // 90s after the first write the tag is still alive thanks to the second one.
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(index.members(&Tag::all_lists()).await.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(index.members(&Tag::all_lists()).await.unwrap().is_empty());
    }
}
