//! Tag-indexed read-through cache for the blog API.
//!
//! Layers, bottom-up:
//!
//! - `backend`: raw byte storage with TTLs and tag sets (Redis or in-process)
//! - `key`: deterministic key and tag naming
//! - `tags`: tagged writes and tag-driven invalidation
//! - `revalidate`: single-flight background refreshes
//! - `service`: the facade handlers talk to
//!
//! Entries are stored as JSON `CacheEntry` envelopes so callers can decide
//! freshness from `cached_at` without a second round trip.

pub mod backend;
pub mod entry;
pub mod key;
mod lock;
pub mod payload;
pub mod revalidate;
pub mod service;
pub mod settings;
pub mod tags;

pub use backend::{Backend, BackendKind, MemoryBackend, RedisBackend, StorageBackend};
pub use entry::CacheEntry;
pub use key::{CacheKey, Tag};
pub use payload::{ItemPayload, ListPayload, ListScope, Visibility};
pub use revalidate::{RevalidationCoordinator, RevalidationHandle, RevalidationOutcome};
pub use service::CacheService;
pub use settings::CacheSettings;
pub use tags::TagIndex;
