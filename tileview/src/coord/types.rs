//! Coordinate type definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest scale a quadkey (and a `u32` tile index) can address.
pub const MAX_SCALE: u8 = 30;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
}

impl LatLong {
    pub fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}

/// A position in projected world pixel space.
///
/// The origin is the north-west corner of the world and Y grows downward
/// (south), matching on-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub fn square(edge: u32) -> Self {
        Self {
            width: edge,
            height: edge,
        }
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::square(DEFAULT_TILE_SIZE)
    }
}

/// Pixel dimensions of the whole projected world at one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelExtent {
    pub width: i64,
    pub height: i64,
}

/// How a provider delivers imagery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    /// A grid of fixed-size tiles addressed by scale, row and column.
    #[default]
    Tiled,
    /// One image rendered by the server for the whole requested area.
    Static,
}

/// Tile coordinates in the Web Mercator / slippy map system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
    /// X coordinate (east-west), 0 at west
    pub column: u32,
    /// Scale (zoom level)
    pub scale: u8,
}

impl TileCoord {
    pub fn new(row: u32, column: u32, scale: u8) -> Self {
        Self { row, column, scale }
    }
}

/// Errors from the quadkey codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuadkeyError {
    /// Decoding an empty string.
    #[error("Quadkey is empty")]
    Empty,

    /// A character other than `0`-`3`.
    #[error("Invalid quadkey '{quadkey}': character '{character}' at position {position} is not a digit 0-3")]
    InvalidDigit {
        quadkey: String,
        character: char,
        position: usize,
    },

    /// More digits than the deepest supported scale.
    #[error("Quadkey '{0}' is longer than the maximum scale {MAX_SCALE}")]
    TooLong(String),

    /// Encoding a tile whose indices are outside the grid at its scale.
    #[error("Tile ({column}, {row}) is outside the grid at scale {scale}")]
    TileOutOfRange { row: u32, column: u32, scale: u8 },

    /// Encoding at a scale deeper than supported.
    #[error("Scale {0} exceeds the maximum scale {MAX_SCALE}")]
    ScaleTooLarge(u8),
}
