//! Cached response envelope.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached payload with its capture time.
///
/// Entries are never mutated in place; a new write replaces the whole envelope.
/// `cached_at` lets callers decide freshness, the cache itself only tracks TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Wrap `data` stamped with the current time.
    pub fn new(data: T) -> Self {
        Self { data, cached_at: Utc::now() }
    }

    pub fn with_timestamp(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    /// Time elapsed since the entry was captured. Clock skew clamps to zero.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at).to_std().unwrap_or_default()
    }

    /// Whether the entry is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        self.age() > stale_after
    }
}
