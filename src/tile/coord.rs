//! Slippy-map tile coordinates.
//!
//! A [`TileCoord`] can only be built through [`TileCoord::new`], so holding one
//! means the zoom and indices are already known to be valid:
//!
//! - `0 <= z <= MAX_ZOOM`
//! - `0 <= x, y < 2^z`

use std::fmt;

use crate::error::CoordError;

/// Highest zoom level served.
pub const MAX_ZOOM: u8 = 22;

/// Namespace shared by every tile cache key.
pub const TILE_KEY_PREFIX: &str = "tile:";

/// A validated tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    z: u8,
    x: u32,
    y: u32,
}

impl TileCoord {
    /// Validate and build a coordinate.
    ///
    /// Inputs are signed so that negative indices coming off the wire are
    /// reported as out of range rather than failing to parse.
    pub fn new(z: i64, x: i64, y: i64) -> Result<Self, CoordError> {
        let zoom = u8::try_from(z)
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .ok_or(CoordError::ZoomOutOfRange { z, max: MAX_ZOOM })?;

        let max_tile = tiles_per_axis(zoom);
        let in_range = |v: i64| (0..i64::from(max_tile)).contains(&v);
        if !in_range(x) || !in_range(y) {
            return Err(CoordError::IndexOutOfRange {
                z: zoom,
                x,
                y,
                max_index: max_tile - 1,
            });
        }

        // Both casts are lossless: the range check above bounds them by 2^22.
        Ok(Self {
            z: zoom,
            x: x as u32,
            y: y as u32,
        })
    }

    pub fn z(&self) -> u8 {
        self.z
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    /// Cache key for this tile: `tile:{z}:{x}:{y}`.
    pub fn cache_key(&self) -> String {
        format!("{TILE_KEY_PREFIX}{}:{}:{}", self.z, self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tiles along one axis at the given zoom.
pub fn tiles_per_axis(z: u8) -> u32 {
    1u32 << z
}
