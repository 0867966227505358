//! In-process fallback backend.
//!
//! Two maps behind their own mutexes: key to `{bytes, expires_at}` and tag to
//! `{members, expires_at}`. Expiry is checked lazily on access; an expired
//! entry reads as absent and is dropped on the spot. Records that are never
//! read again are swept by the first write after each `SWEEP_INTERVAL`. Only
//! consistent within a single process.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::StorageBackend;
use crate::Error;
use crate::cache::lock::mutex_lock;

const TARGET: &str = "cache::backend::memory";

/// Minimum time between write-triggered sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
struct TagRecord {
    members: HashSet<String>,
    /// `None` until the first `tag_expire`, matching a Redis set without TTL.
    expires_at: Option<Instant>,
}

impl TagRecord {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local backend with the same tag semantics as Redis.
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, StoredValue>>,
    tags: Mutex<HashMap<String, TagRecord>>,
    next_sweep: Mutex<Instant>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            entries: Mutex::default(),
            tags: Mutex::default(),
            next_sweep: Mutex::new(Instant::now() + SWEEP_INTERVAL),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purge once the sweep deadline has passed, then push it forward.
    fn maybe_sweep(&self, now: Instant) {
        let mut deadline = mutex_lock(&self.next_sweep, TARGET, "maybe_sweep");
        if now < *deadline {
            return;
        }
        *deadline = now + SWEEP_INTERVAL;
        drop(deadline);

        self.purge_expired();
    }

    /// Drop every expired entry and tag.
    ///
    /// Returns the number of removed records.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();

        let mut entries = mutex_lock(&self.entries, TARGET, "purge_expired");
        let before = entries.len();
        entries.retain(|_, value| value.expires_at > now);
        let mut removed = before - entries.len();
        drop(entries);

        let mut tags = mutex_lock(&self.tags, TARGET, "purge_expired");
        let before = tags.len();
        tags.retain(|_, record| !record.is_expired(now));
        removed += before - tags.len();

        if removed > 0 {
            tracing::debug!(removed, "purged expired in-process cache records");
        }
        removed
    }

    /// Number of stored keys, expired ones included until they are read or swept.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, TARGET, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, TARGET, "get");

        match entries.get(key) {
            Some(value) if value.expires_at > now => Ok(Some(value.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let stored = StoredValue { bytes: value.to_vec(), expires_at: now + ttl };
        mutex_lock(&self.entries, TARGET, "set_with_ttl").insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut entries = mutex_lock(&self.entries, TARGET, "delete");
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn tag_add_member(&self, tag: &str, key: &str) -> Result<(), Error> {
        let now = Instant::now();
        self.maybe_sweep(now);

        let mut tags = mutex_lock(&self.tags, TARGET, "tag_add_member");

        let record = tags.entry(tag.to_string()).or_default();
        if record.is_expired(now) {
            *record = TagRecord::default();
        }
        record.members.insert(key.to_string());
        Ok(())
    }

    async fn tag_members(&self, tag: &str) -> Result<Vec<String>, Error> {
        let now = Instant::now();
        let mut tags = mutex_lock(&self.tags, TARGET, "tag_members");

        match tags.get(tag) {
            Some(record) if !record.is_expired(now) => Ok(record.members.iter().cloned().collect()),
            Some(_) => {
                tags.remove(tag);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn tag_expire(&self, tag: &str, ttl: Duration) -> Result<(), Error> {
        let now = Instant::now();
        let mut tags = mutex_lock(&self.tags, TARGET, "tag_expire");

        // Like EXPIRE on a missing key: nothing to arm.
        if let Some(record) = tags.get_mut(tag)
            && !record.is_expired(now)
        {
            record.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn tag_delete(&self, tag: &str) -> Result<(), Error> {
        mutex_lock(&self.tags, TARGET, "tag_delete").remove(tag);
        Ok(())
    }
}
