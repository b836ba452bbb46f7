use std::time::Duration;

use thiserror::Error;

/// Errors produced when validating a tile coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Zoom level outside the supported range
    #[error("Zoom level out of bounds: {z} (valid range: 0-{max})")]
    ZoomOutOfRange { z: i64, max: u8 },

    /// Column or row index outside `[0, 2^z)`
    #[error("Tile index ({x}, {y}) out of bounds at zoom {z} (valid range: 0-{max_index})")]
    IndexOutOfRange {
        z: u8,
        x: i64,
        y: i64,
        max_index: u32,
    },
}

/// Errors talking to the tile cache backend.
///
/// None of these are fatal to a tile request: the tile service logs them and
/// falls back to the database.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backend could not be reached or no connection was available
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// The backend rejected a command
    #[error("Cache command failed: {0}")]
    Command(String),

    /// The operation did not complete within the configured timeout
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value could not be decoded back into tile bytes
    #[error("Corrupt cache entry {key}: {message}")]
    Corrupt { key: String, message: String },
}

/// Errors from the spatial database.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Connection settings could not be parsed
    #[error("Invalid database configuration: {0}")]
    Config(String),

    /// The connection pool could not be created
    #[error("Unable to build the database pool: {0}")]
    PoolBuild(String),

    /// No connection could be obtained (unreachable, exhausted, timed out)
    #[error("Unable to get a database connection: {0}")]
    Connection(String),

    /// A statement failed to execute
    #[error("Database error while {context}: {message}")]
    Query {
        context: &'static str,
        message: String,
    },

    /// A statement was cancelled by the server or exceeded our own deadline
    #[error("Database query timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors returned by the tile service.
///
/// An empty tile is not an error; see [`crate::tile::TileOutcome::Empty`].
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The caller asked for a coordinate that does not exist
    #[error("Invalid tile coordinates: {0}")]
    InvalidCoordinate(#[from] CoordError),

    /// The database could not produce the tile
    #[error("Tile source unavailable: {0}")]
    Unavailable(#[from] SourceError),
}

/// Errors in bounding-box query parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    #[error("Missing required parameters: minLng, minLat, maxLng, maxLat")]
    Missing,

    #[error("Invalid coordinate value for {param}: {value:?}")]
    InvalidValue { param: &'static str, value: String },
}
