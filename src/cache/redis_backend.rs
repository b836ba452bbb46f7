//! Redis-backed cache backend.
//!
//! Connections come from a `deadpool-redis` pool that is created once at
//! startup and shared by every request.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisConfig, Connection, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use tracing::debug;

use crate::error::CacheError;

use super::CacheBackend;

/// Number of keys requested per `SCAN` round trip.
const SCAN_BATCH_SIZE: usize = 100;

/// Redis implementation of [`CacheBackend`].
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create a backend for the given `redis://` URL.
    ///
    /// No connection is opened here; the first command (or [`CacheBackend::ping`])
    /// does that. Waiting for, opening and recycling a pooled connection are
    /// each bounded by `connect_timeout`.
    pub fn new(
        url: &str,
        max_connections: usize,
        connect_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let mut config = RedisConfig::from_url(url);
        config.pool = Some(pool_config(max_connections, connect_timeout));
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(format!("failed to create Redis pool: {e}")))?;
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

fn pool_config(max_connections: usize, connect_timeout: Duration) -> PoolConfig {
    let mut pool = PoolConfig::new(max_connections.max(1));
    pool.timeouts = Timeouts {
        wait: Some(connect_timeout),
        create: Some(connect_timeout),
        recycle: Some(connect_timeout),
    };
    pool
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::Command(format!("SETEX {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| CacheError::Command(format!("GET {key}: {e}")))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection().await?;
        let pattern = scan_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        // SCAN keeps the server responsive where KEYS would block it.
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Command(format!("SCAN {pattern}: {e}")))?;

            if !keys.is_empty() {
                let unlinked: usize = redis::cmd("UNLINK")
                    .arg(&keys)
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| CacheError::Command(format!("UNLINK: {e}")))?;
                removed += unlinked;
                debug!(batch = keys.len(), unlinked, "Removed cached tiles");
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Command(format!("PING: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Build a `SCAN MATCH` pattern matching every key that starts with `prefix`.
///
/// Glob metacharacters in the prefix are escaped so they match literally.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
