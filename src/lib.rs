//! # Road Tiles
//!
//! A Mapbox Vector Tile server for a road network stored in PostGIS.
//!
//! Tiles are rendered by the database and served through a read-through cache
//! so repeated requests for the same `z/x/y` never reach the database while
//! the cached copy is fresh.
//!
//! ## Features
//!
//! - **Read-through tile cache**: Redis (shared) or in-process LRU, 24 hour TTL
//! - **Graceful degradation**: a slow or failing cache only costs a database render
//! - **GeoJSON endpoints**: all roads, roads in a bounding box, statistics
//! - **TileJSON**: the index document describes the tile source for map clients
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`tile`] - Coordinate validation and the tile service
//! - [`cache`] - Cache store and its Redis / in-memory backends
//! - [`source`] - Road data source and the Postgres pool
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use road_tiles::{create_router, MemoryBackend, PgPool, PgRoadSource, PoolSettings, RouterConfig, TileCache, TileService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pg_config = "host=localhost dbname=roads user=postgres".parse()?;
//!     let pool = PgPool::new(pg_config, PoolSettings::default())?;
//!
//!     let cache = TileCache::new(Arc::new(MemoryBackend::new()));
//!     let service = TileService::new(PgRoadSource::new(pool), cache);
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use cache::{
    CacheBackend, MemoryBackend, RedisBackend, TileCache, DEFAULT_CACHE_TIMEOUT, TILE_CACHE_TTL,
};
pub use config::{CacheArgs, CheckConfig, ClearCacheConfig, Cli, Command, DatabaseArgs, ServeConfig};
pub use error::{BoundsError, CacheError, CoordError, SourceError, TileError};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use source::{
    Bounds, ConnectionInfo, PgPool, PgRoadSource, PoolSettings, QueryStats, RoadSource, RoadStats,
};
pub use tile::{TileCoord, TileOutcome, TileService, MAX_ZOOM};
