//! HTTP request handlers for the road tile API.
//!
//! This module contains the Axum handlers for serving tiles, GeoJSON, statistics
//! and health checks.
//!
//! # Endpoints
//!
//! - `GET /` - Service index with a TileJSON document
//! - `GET /api/tiles/{z}/{x}/{y}.mvt` - Serve a vector tile
//! - `GET /api/roads` - All roads as GeoJSON
//! - `GET /api/roads/bounds` - Roads intersecting a bounding box
//! - `GET /api/stats` - Road network statistics
//! - `GET /api/health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::error::{BoundsError, SourceError, TileError};
use crate::source::{Bounds, RoadSource, RoadStats};
use crate::tile::{TileOutcome, TileService};

/// Media type of Mapbox Vector Tiles.
pub const MVT_CONTENT_TYPE: &str = "application/x-protobuf";

/// Response header reporting whether a tile was served from the cache.
pub const TILE_CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-tile-cache-hit");

/// Highest zoom advertised in the TileJSON document.
const TILEJSON_MAX_ZOOM: u8 = 14;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: RoadSource> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<S>>,

    /// Cache-Control max-age in seconds for tiles (defaults to 24 hours)
    pub cache_max_age: u32,

    /// Base URL advertised in the TileJSON document
    pub public_url: Arc<str>,
}

impl<S: RoadSource> AppState<S> {
    /// Create a new application state with the given tile service.
    pub fn new(tile_service: TileService<S>) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age: 86_400,
            public_url: Arc::from("http://localhost:3000"),
        }
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }

    /// Set the base URL advertised to clients.
    pub fn with_public_url(mut self, public_url: &str) -> Self {
        self.public_url = Arc::from(public_url.trim_end_matches('/'));
        self
    }

    /// The road source behind the tile service.
    pub fn source(&self) -> &S {
        self.tile_service.source()
    }
}

impl<S: RoadSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
            public_url: Arc::clone(&self.public_url),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/api/tiles/{z}/{x}/{filename}`
/// where filename is `{y}` or `{y}.mvt`. Values are kept as strings so that
/// non-numeric input gets the same JSON error as out-of-range input.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Zoom level
    pub z: String,

    /// Tile column
    pub x: String,

    /// Tile row with optional .mvt extension (e.g., "0" or "0.mvt")
    pub filename: String,
}

impl TilePathParams {
    /// Parse `(z, x, y)`, stripping any .mvt extension from the row.
    pub fn coordinates(&self) -> Result<(i64, i64, i64), HandlerError> {
        let y = self
            .filename
            .strip_suffix(".mvt")
            .unwrap_or(&self.filename);
        Ok((parse_index(&self.z)?, parse_index(&self.x)?, parse_index(y)?))
    }
}

fn parse_index(value: &str) -> Result<i64, HandlerError> {
    value.parse().map_err(|_| HandlerError::InvalidPath {
        value: value.to_string(),
    })
}

/// Query parameters for the bounding-box endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsQueryParams {
    pub min_lng: Option<String>,
    pub min_lat: Option<String>,
    pub max_lng: Option<String>,
    pub max_lat: Option<String>,
}

impl BoundsQueryParams {
    pub fn bounds(&self) -> Result<Bounds, BoundsError> {
        Bounds::parse(
            self.min_lng.as_deref(),
            self.min_lat.as_deref(),
            self.max_lng.as_deref(),
            self.max_lat.as_deref(),
        )
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_coordinates", "internal_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Current server time, RFC 3339
    pub timestamp: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// Invalid coordinates are a 400 with the validation message. Database
/// failures are a 500 with a generic message; the cause is only logged.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        match &self {
            TileError::InvalidCoordinate(e) => error_response(
                StatusCode::BAD_REQUEST,
                "invalid_coordinates",
                e.to_string(),
            ),
            TileError::Unavailable(e) => {
                error!(error = %e, "Tile request failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error",
                )
            }
        }
    }
}

impl IntoResponse for BoundsError {
    fn into_response(self) -> Response {
        let error_type = match self {
            BoundsError::Missing => "missing_parameters",
            BoundsError::InvalidValue { .. } => "invalid_coordinates",
        };
        error_response(StatusCode::BAD_REQUEST, error_type, self.to_string())
    }
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum HandlerError {
    /// A tile path segment is not an integer
    InvalidPath { value: String },

    Tile(TileError),

    Bounds(BoundsError),

    /// A database call failed; `context` is the client-facing description
    Database {
        context: &'static str,
        source: SourceError,
    },
}

impl HandlerError {
    fn database(context: &'static str) -> impl FnOnce(SourceError) -> Self {
        move |source| Self::Database { context, source }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::InvalidPath { value } => error_response(
                StatusCode::BAD_REQUEST,
                "invalid_coordinates",
                format!("Invalid tile coordinates: {value:?} is not an integer"),
            ),
            HandlerError::Tile(e) => e.into_response(),
            HandlerError::Bounds(e) => e.into_response(),
            HandlerError::Database { context, source } => {
                error!(error = %source, "Error {context}");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    format!("Failed {context}"),
                )
            }
        }
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError::Tile(err)
    }
}

impl From<BoundsError> for HandlerError {
    fn from(err: BoundsError) -> Self {
        HandlerError::Bounds(err)
    }
}

fn error_response(status: StatusCode, error_type: &str, message: impl Into<String>) -> Response {
    let message = message.into();
    if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }
    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /api/tiles/{z}/{x}/{y}.mvt`
///
/// # Response
///
/// - `200 OK`: MVT bytes with `Content-Type: application/x-protobuf`
/// - `204 No Content`: Valid coordinate with no roads
/// - `400 Bad Request`: Non-numeric or out-of-range coordinates
/// - `500 Internal Server Error`: Database unavailable
///
/// # Headers
///
/// - `Content-Type: application/x-protobuf`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler<S: RoadSource>(
    State(state): State<AppState<S>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let (z, x, y) = params.coordinates()?;

    match state.tile_service.get_tile(z, x, y).await? {
        TileOutcome::Empty => {
            debug!(z, x, y, "Empty tile");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        TileOutcome::Data { data, cache_hit } => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, MVT_CONTENT_TYPE.to_string()),
                (
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", state.cache_max_age),
                ),
                (TILE_CACHE_HIT_HEADER, cache_hit.to_string()),
            ],
            data,
        )
            .into_response()),
    }
}

/// Handle requests for every road as GeoJSON.
///
/// `GET /api/roads`
pub async fn roads_handler<S: RoadSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<Value>, HandlerError> {
    let geojson = state
        .source()
        .roads_geojson()
        .await
        .map_err(HandlerError::database("fetching roads"))?;
    Ok(Json(geojson))
}

/// Handle bounding-box road queries.
///
/// `GET /api/roads/bounds?minLng=&minLat=&maxLng=&maxLat=`
///
/// All four parameters are required and must be numbers.
pub async fn roads_bounds_handler<S: RoadSource>(
    State(state): State<AppState<S>>,
    Query(query): Query<BoundsQueryParams>,
) -> Result<Json<Value>, HandlerError> {
    let bounds = query.bounds()?;
    let geojson = state
        .source()
        .roads_in_bounds(bounds)
        .await
        .map_err(HandlerError::database("fetching roads by bounds"))?;
    Ok(Json(geojson))
}

/// Handle statistics requests.
///
/// `GET /api/stats`
pub async fn stats_handler<S: RoadSource>(
    State(state): State<AppState<S>>,
) -> Result<Json<RoadStats>, HandlerError> {
    let stats = state
        .source()
        .stats()
        .await
        .map_err(HandlerError::database("fetching stats"))?;
    Ok(Json(stats))
}

/// Handle health check requests.
///
/// Does not touch the database or cache.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Service index with the endpoint list and a TileJSON 2.2.0 document.
pub async fn index_handler<S: RoadSource>(State(state): State<AppState<S>>) -> Json<Value> {
    Json(index_document(&state.public_url))
}

fn index_document(public_url: &str) -> Value {
    json!({
        "message": "Road Tiles API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "tiles": "/api/tiles/{z}/{x}/{y}.mvt",
            "roads": "/api/roads",
            "roadsByBounds": "/api/roads/bounds?minLng=&minLat=&maxLng=&maxLat=",
            "stats": "/api/stats",
            "health": "/api/health",
        },
        "documentation": {
            "mapbox": "https://docs.mapbox.com/vector-tiles/reference/",
            "tilejson": {
                "tilejson": "2.2.0",
                "name": "Roads",
                "description": "Road network in Vietnam",
                "version": env!("CARGO_PKG_VERSION"),
                "attribution": "Roads API",
                "scheme": "xyz",
                "tiles": [format!("{public_url}/api/tiles/{{z}}/{{x}}/{{y}}.mvt")],
                "minzoom": 0,
                "maxzoom": TILEJSON_MAX_ZOOM,
                "bounds": [102.0, 8.0, 109.5, 23.5],
                "center": [106.0, 16.0, 6],
            },
        },
    })
}

// =============================================================================
// Tests
// =============================================================================
