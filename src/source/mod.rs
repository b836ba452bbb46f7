//! Road data source layer.
//!
//! The spatial database renders tiles and computes GeoJSON and statistics;
//! this crate only forwards parameters and hands back what it returns.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Tile Service / HTTP Handlers      │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           RoadSource Trait              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   PgRoadSource  ──▶  PgPool (deadpool)  │
//! └─────────────────────────────────────────┘
//! ```

mod pool;
mod postgres;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BoundsError, SourceError};
use crate::tile::TileCoord;

pub use pool::{PgPool, PoolSettings, QueryStats, SLOW_QUERY_THRESHOLD};
pub use postgres::PgRoadSource;

/// Read-only access to the road network.
///
/// Every call is idempotent and safe to repeat.
#[async_trait]
pub trait RoadSource: Send + Sync {
    /// Render the MVT tile at `coord`.
    ///
    /// `Ok(None)` means the database produced no tile for this coordinate.
    async fn get_tile(&self, coord: TileCoord) -> Result<Option<Bytes>, SourceError>;

    /// All roads as a GeoJSON `FeatureCollection`.
    async fn roads_geojson(&self) -> Result<Value, SourceError>;

    /// Roads whose geometry intersects `bounds`, as a GeoJSON `FeatureCollection`.
    async fn roads_in_bounds(&self, bounds: Bounds) -> Result<Value, SourceError>;

    /// Summary statistics over the road table.
    async fn stats(&self) -> Result<RoadStats, SourceError>;

    /// Run a trivial query and describe the server.
    async fn check_connection(&self) -> Result<ConnectionInfo, SourceError>;
}

/// A WGS84 bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// Parse the four query-string values of a bounding-box request.
    ///
    /// Every value must be present and a finite number.
    pub fn parse(
        min_lng: Option<&str>,
        min_lat: Option<&str>,
        max_lng: Option<&str>,
        max_lat: Option<&str>,
    ) -> Result<Self, BoundsError> {
        let (Some(min_lng), Some(min_lat), Some(max_lng), Some(max_lat)) =
            (min_lng, min_lat, max_lng, max_lat)
        else {
            return Err(BoundsError::Missing);
        };
        if [min_lng, min_lat, max_lng, max_lat]
            .iter()
            .any(|v| v.trim().is_empty())
        {
            return Err(BoundsError::Missing);
        }

        Ok(Self {
            min_lng: parse_number("minLng", min_lng)?,
            min_lat: parse_number("minLat", min_lat)?,
            max_lng: parse_number("maxLng", max_lng)?,
            max_lat: parse_number("maxLat", max_lat)?,
        })
    }
}

fn parse_number(param: &'static str, value: &str) -> Result<f64, BoundsError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| BoundsError::InvalidValue {
            param,
            value: value.to_string(),
        })
}

/// Aggregate figures for the road table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadStats {
    pub total_roads: i64,
    pub road_types: i64,
    /// `ST_Extent` of all geometries, e.g. `BOX(102.1 8.6,109.4 23.3)`
    pub bounds: Option<String>,
    pub total_length_km: Option<f64>,
}

/// Identity of the connected database server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub time: String,
    pub database: String,
    pub user: String,
    pub version: String,
}
