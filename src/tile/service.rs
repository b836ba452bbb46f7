//! Tile Service for serving road tiles through a read-through cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Validate z/x/y    3. Miss: render from database     │    │
//! │  │  2. Check cache       4. Non-empty: cache & return      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                 │                              │                │
//! │                 ▼                              ▼                │
//! │          ┌───────────┐                 ┌──────────────┐         │
//! │          │ TileCache │                 │  RoadSource  │         │
//! │          └───────────┘                 └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service holds no mutable state of its own. Two concurrent misses on the
//! same coordinate both render and both write the same bytes; the last write
//! wins.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::TileCache;
use crate::error::{CacheError, SourceError, TileError};
use crate::source::RoadSource;

use super::coord::TileCoord;

/// Default upper bound on a single database tile render.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Tile Outcome
// =============================================================================

/// Successful result of a tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    /// Encoded tile bytes
    Data {
        data: Bytes,
        /// Whether the bytes came from the cache
        cache_hit: bool,
    },

    /// The coordinate is valid but there is nothing to draw there
    Empty,
}

impl TileOutcome {
    /// The tile bytes, if any.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Self::Data { data, .. } => Some(data),
            Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

// =============================================================================
// Tile Service
// =============================================================================

/// Read-through cache in front of a [`RoadSource`].
///
/// # Example
///
/// ```ignore
/// use road_tiles::cache::{MemoryBackend, TileCache};
/// use road_tiles::tile::{TileOutcome, TileService};
///
/// let cache = TileCache::new(Arc::new(MemoryBackend::new()));
/// let service = TileService::new(source, cache);
///
/// match service.get_tile(10, 500, 500).await? {
///     TileOutcome::Data { data, cache_hit } => println!("{} bytes, hit={cache_hit}", data.len()),
///     TileOutcome::Empty => println!("no roads here"),
/// }
/// ```
pub struct TileService<S: RoadSource> {
    source: Arc<S>,
    cache: TileCache,
    source_timeout: Duration,
}

impl<S: RoadSource> TileService<S> {
    /// Create a service with the default source timeout.
    pub fn new(source: S, cache: TileCache) -> Self {
        Self::with_shared_source(Arc::new(source), cache)
    }

    /// Create a service over a source that is shared with other components.
    pub fn with_shared_source(source: Arc<S>, cache: TileCache) -> Self {
        Self {
            source,
            cache,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Override the upper bound on a single database render.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Get the tile at `z/x/y`.
    ///
    /// 1. Rejects coordinates outside `0 <= z <= 22`, `0 <= x, y < 2^z`
    ///    without touching the cache or database.
    /// 2. Returns a cached tile if present. Cache failures are logged and
    ///    treated as a miss.
    /// 3. Otherwise renders from the database. An absent or zero-length tile
    ///    is returned as [`TileOutcome::Empty`] and is not cached.
    /// 4. Caches a rendered tile before returning it. A failed cache write is
    ///    logged and does not affect the response.
    ///
    /// # Errors
    ///
    /// - [`TileError::InvalidCoordinate`] for out-of-range coordinates
    /// - [`TileError::Unavailable`] when the database fails or times out
    pub async fn get_tile(&self, z: i64, x: i64, y: i64) -> Result<TileOutcome, TileError> {
        let coord = TileCoord::new(z, x, y)?;
        self.get_tile_at(coord).await
    }

    /// Get a tile for an already validated coordinate.
    pub async fn get_tile_at(&self, coord: TileCoord) -> Result<TileOutcome, TileError> {
        match self.cache.get(coord).await {
            Ok(Some(data)) => {
                debug!(%coord, bytes = data.len(), "Tile cache hit");
                return Ok(if data.is_empty() {
                    TileOutcome::Empty
                } else {
                    TileOutcome::Data {
                        data,
                        cache_hit: true,
                    }
                });
            }
            Ok(None) => debug!(%coord, "Tile cache miss"),
            Err(e) => log_cache_error(coord, "read", &e),
        }

        let data = match self.render(coord).await? {
            Some(data) if !data.is_empty() => data,
            _ => {
                debug!(%coord, "No tile data at coordinate");
                return Ok(TileOutcome::Empty);
            }
        };

        let outcome = TileOutcome::Data {
            data: data.clone(),
            cache_hit: false,
        };
        if let Err(e) = self.cache.set(coord, &data).await {
            log_cache_error(coord, "write", &e);
        }
        Ok(outcome)
    }

    /// Render a tile from the database without consulting the cache.
    pub async fn render(&self, coord: TileCoord) -> Result<Option<Bytes>, TileError> {
        let result = tokio::time::timeout(self.source_timeout, self.source.get_tile(coord))
            .await
            .unwrap_or(Err(SourceError::Timeout(self.source_timeout)));

        result.map_err(|e| {
            warn!(%coord, error = %e, "Failed to render tile");
            TileError::Unavailable(e)
        })
    }

    /// Remove every cached tile, returning how many entries were deleted.
    pub async fn clear_cache(&self) -> Result<usize, CacheError> {
        self.cache.clear().await
    }

    /// The underlying road source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// The tile cache.
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }
}

fn log_cache_error(coord: TileCoord, op: &str, e: &CacheError) {
    match e {
        CacheError::Corrupt { .. } => {
            warn!(%coord, op, error = %e, "Ignoring unreadable cache entry")
        }
        _ => warn!(%coord, op, error = %e, "Tile cache unavailable, continuing without it"),
    }
}

// =============================================================================
// Tests
// =============================================================================
