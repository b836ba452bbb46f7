//! Tile service layer.
//!
//! This module validates tile coordinates and serves Mapbox Vector Tiles
//! through a read-through cache.
//!
//! # Architecture
//!
//! The tile service sits between the HTTP layer and the road database:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCoord   │  │    TileCache    │  │
//! │  │  (validate)  │  │  (base64, 24h)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               RoadSource                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCoord`]: A validated `z/x/y` address and its cache key
//! - [`TileService`]: Main entry point for tile requests
//! - [`TileOutcome`]: Tile bytes with their cache status, or empty
//!
//! # Example
//!
//! ```
//! use road_tiles::tile::TileCoord;
//!
//! let coord = TileCoord::new(10, 500, 500).unwrap();
//! assert_eq!(coord.cache_key(), "tile:10:500:500");
//!
//! assert!(TileCoord::new(3, 8, 0).is_err());
//! ```

mod coord;
mod service;

pub use coord::{tiles_per_axis, TileCoord, MAX_ZOOM, TILE_KEY_PREFIX};
pub use service::{TileOutcome, TileService, DEFAULT_SOURCE_TIMEOUT};
