//! In-process cache backend.
//!
//! Used when no Redis URL is configured, and by tests. Entries live in a
//! bounded LRU map and carry their own expiry instant; an expired entry reads
//! as absent and is dropped on access.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CacheError;

use super::CacheBackend;

/// Default maximum number of entries.
pub const DEFAULT_MEMORY_CACHE_ENTRIES: usize = 10_000;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Bounded in-memory [`CacheBackend`].
///
/// Not shared across processes: each server instance warms its own copy.
pub struct MemoryBackend {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryBackend {
    /// Create a backend holding at most [`DEFAULT_MEMORY_CACHE_ENTRIES`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CACHE_ENTRIES)
    }

    /// Create a backend holding at most `max_entries` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, including ones that have expired but
    /// not yet been touched.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.put(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => true,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let keys: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        // Expired entries are dropped too, but only live ones are counted.
        let mut removed = 0;
        for key in &keys {
            if entries.pop(key).is_some_and(|entry| entry.expires_at > now) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
