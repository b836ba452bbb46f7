//! HTTP server layer for Road Tiles.
//!
//! This module provides the HTTP API for serving road vector tiles and GeoJSON.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │              GET /api/tiles/{z}/{x}/{y}.mvt                     │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error bodies) │  │ (CORS, gzip, tracing)       │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, index_handler, roads_bounds_handler, roads_handler, stats_handler,
    tile_handler, AppState, BoundsQueryParams, ErrorResponse, HandlerError, HealthResponse,
    TilePathParams, MVT_CONTENT_TYPE, TILE_CACHE_HIT_HEADER,
};
pub use routes::{create_router, RouterConfig};
