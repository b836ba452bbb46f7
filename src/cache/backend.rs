use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// A shared key/value store with per-entry expiry.
///
/// Values are text; callers that store binary data encode it first. An absent
/// or expired key is `Ok(None)`, never an error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store `value` under `key`, replacing any existing entry and its TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
