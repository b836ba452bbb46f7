//! The tile cache store.
//!
//! [`TileCache`] is the only place that knows how tiles are laid out in the
//! shared cache:
//!
//! - Key: `tile:{z}:{x}:{y}` (see [`TileCoord::cache_key`])
//! - Value: the tile bytes as standard base64, so arbitrary binary survives a
//!   text-only store unchanged
//! - TTL: [`TILE_CACHE_TTL`], reset on every write
//!
//! Each backend call is bounded by a timeout so a slow cache can never hold a
//! request longer than the caller is willing to wait. Clearing walks the whole
//! tile namespace and gets a longer bound of its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::CacheError;
use crate::tile::{TileCoord, TILE_KEY_PREFIX};

use super::CacheBackend;

/// Lifetime of a cached tile: 24 hours.
pub const TILE_CACHE_TTL: Duration = Duration::from_secs(86_400);

/// Default per-operation timeout.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default bound on [`TileCache::clear`].
pub const DEFAULT_CLEAR_TIMEOUT: Duration = Duration::from_secs(60);

/// Coordinate-keyed, binary-safe view over a [`CacheBackend`].
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct TileCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    timeout: Duration,
    clear_timeout: Duration,
}

impl TileCache {
    /// Create a store with the default TTL and timeout.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_timeout(backend, DEFAULT_CACHE_TIMEOUT)
    }

    /// Create a store with a custom per-operation timeout.
    pub fn with_timeout(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            ttl: TILE_CACHE_TTL,
            timeout,
            clear_timeout: DEFAULT_CLEAR_TIMEOUT.max(timeout),
        }
    }

    /// Override the bound on [`TileCache::clear`].
    pub fn with_clear_timeout(mut self, timeout: Duration) -> Self {
        self.clear_timeout = timeout;
        self
    }

    /// Store a tile, replacing any previous entry and resetting its TTL.
    pub async fn set(&self, coord: TileCoord, data: &Bytes) -> Result<(), CacheError> {
        let key = coord.cache_key();
        let encoded = STANDARD.encode(data);
        self.bounded(self.timeout, self.backend.set(&key, encoded, self.ttl)).await
    }

    /// Fetch a tile. `Ok(None)` means the tile is not cached (or expired).
    pub async fn get(&self, coord: TileCoord) -> Result<Option<Bytes>, CacheError> {
        let key = coord.cache_key();
        let Some(encoded) = self.bounded(self.timeout, self.backend.get(&key)).await? else {
            return Ok(None);
        };
        let data = STANDARD.decode(encoded).map_err(|e| CacheError::Corrupt {
            key,
            message: e.to_string(),
        })?;
        Ok(Some(Bytes::from(data)))
    }

    /// Remove every cached tile. Keys outside the tile namespace are untouched.
    ///
    /// Bounded by the clear timeout rather than the per-operation one. Keys
    /// deleted before the timeout fires stay deleted.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        self.bounded(
            self.clear_timeout,
            self.backend.delete_by_prefix(TILE_KEY_PREFIX),
        )
        .await
    }

    /// Check that the backend is reachable within the timeout.
    pub async fn ping(&self) -> Result<(), CacheError> {
        self.bounded(self.timeout, self.backend.ping()).await
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn clear_timeout(&self) -> Duration {
        self.clear_timeout
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(limit, op)
            .await
            .map_err(|_| CacheError::Timeout(limit))?
    }
}
