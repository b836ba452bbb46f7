//! Router configuration for Road Tiles.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! compression and request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /                                  - Service index and TileJSON
//! /api/tiles/{z}/{x}/{y}.mvt         - Vector tile endpoint
//! /api/roads                         - All roads (GeoJSON)
//! /api/roads/bounds                  - Roads in a bounding box (GeoJSON)
//! /api/stats                         - Road statistics
//! /api/health                        - Health check
//! ```
//!
//! # Example
//!
//! ```ignore
//! use road_tiles::server::{create_router, RouterConfig};
//! use road_tiles::tile::TileService;
//!
//! let tile_service = TileService::new(source, cache);
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()])
//!     .with_public_url("https://tiles.example.com");
//!
//! let router = create_router(tile_service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::compression::predicate::{And, DefaultPredicate, NotForContentType, Predicate};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, index_handler, roads_bounds_handler, roads_handler, stats_handler,
    tile_handler, AppState, MVT_CONTENT_TYPE,
};
use crate::source::RoadSource;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for tiles
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Base URL advertised in the TileJSON document
    pub public_url: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 24 hours (86400 seconds)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 86_400,
            enable_tracing: true,
            public_url: "http://localhost:3000".to_string(),
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the base URL advertised to clients.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - The service index at `/`
/// - The tile, road, stats and health routes under `/api`
/// - CORS configuration
/// - gzip response compression
/// - Request tracing (optional)
pub fn create_router<S>(tile_service: TileService<S>, config: RouterConfig) -> Router
where
    S: RoadSource + 'static,
{
    let app_state = AppState::new(tile_service)
        .with_cache_max_age(config.cache_max_age)
        .with_public_url(&config.public_url);

    let cors = build_cors_layer(&config);

    // {filename} captures both "{y}" and "{y}.mvt"
    let api_routes = Router::new()
        .route("/tiles/{z}/{x}/{filename}", get(tile_handler::<S>))
        .route("/roads", get(roads_handler::<S>))
        .route("/roads/bounds", get(roads_bounds_handler::<S>))
        .route("/stats", get(stats_handler::<S>))
        .route("/health", get(health_handler));

    let router = Router::new()
        .route("/", get(index_handler::<S>))
        .nest("/api", api_routes)
        .with_state(app_state)
        .layer(build_compression_layer())
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Gzip JSON responses for clients that accept it. Tiles are always sent as
/// the raw bytes the database produced.
fn build_compression_layer() -> CompressionLayer<And<DefaultPredicate, NotForContentType>> {
    CompressionLayer::new()
        .gzip(true)
        .compress_when(DefaultPredicate::new().and(NotForContentType::const_new(MVT_CONTENT_TYPE)))
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.iter().any(|o| o == "*") => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
