//! Redis-backed shared store.
//!
//! Entries are plain strings written with `PSETEX`; tags are Redis sets
//! (`SADD` / `SMEMBERS` / `PEXPIRE` / `DEL`). The `ConnectionManager` is one
//! multiplexed connection shared by every clone of the backend and
//! reconnects transparently after transient network errors.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use super::StorageBackend;
use crate::Error;

/// Shared Redis backend.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendUnavailable` if the URL is invalid, the
    /// connection cannot be established within `connect_timeout`, or the
    /// server does not answer.
    pub async fn connect(url: &str, connect_timeout: Duration, response_timeout: Duration) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(connect_timeout)
            .set_response_timeout(response_timeout)
            .set_number_of_retries(1);

        let manager = tokio::time::timeout(connect_timeout, ConnectionManager::new_with_config(client, config))
            .await
            .map_err(|_| Error::BackendUnavailable(format!("connect timed out after {connect_timeout:?}")))?
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        let mut conn = manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        tracing::debug!(reply = %pong, "redis ping ok");

        Ok(Self { conn: manager })
    }
}

fn millis(ttl: Duration) -> u64 {
    // PSETEX/PEXPIRE reject 0.
    ttl.as_millis().clamp(1, u64::MAX as u128) as u64
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.pset_ex(key, value, millis(ttl)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn tag_add_member(&self, tag: &str, key: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(tag, key).await?;
        Ok(())
    }

    async fn tag_members(&self, tag: &str) -> Result<Vec<String>, Error> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(tag).await?;
        Ok(members)
    }

    async fn tag_expire(&self, tag: &str, ttl: Duration) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.pexpire(tag, millis(ttl) as i64).await?;
        Ok(())
    }

    async fn tag_delete(&self, tag: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(tag).await?;
        Ok(())
    }
}
