//! Coordinate conversion module
//!
//! Provides the per-provider [`Projection`] (conversions between geographic
//! coordinates and Web Mercator world pixels/tiles) and the quadkey codec
//! used by quadtree-addressed tile servers.
//!
//! # Conventions
//!
//! - Pixel and tile Y grow downward: row 0 is the northernmost row.
//! - Column 0 starts at the antimeridian (longitude -180°).
//! - The world at scale `s` is `2^s` tiles on each side.

mod projection;
mod quadkey;
mod types;

pub use projection::Projection;
pub use quadkey::{decode_quadkey, encode_quadkey, quadkey_to_tile, tile_to_quadkey};
pub use types::{
    LatLong, PixelExtent, PixelPoint, ProjectionKind, QuadkeyError, TileCoord, TileSize,
    DEFAULT_TILE_SIZE, MAX_LAT, MAX_LON, MAX_SCALE, MIN_LAT, MIN_LON,
};
