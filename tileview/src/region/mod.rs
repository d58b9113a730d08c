//! Region building
//!
//! Converts a requested view (center, size, heading, scale, style) into the
//! blocks that cover it:
//!
//! 1. The center and scale are clamped to the projection's bounds.
//! 2. A `width × height` rectangle around the center is rotated by the
//!    draw-time rotation and its axis-aligned bounding box is taken.
//! 3. Tiled projections intersect that box with the tile grid, wrapping
//!    columns across the antimeridian. Static projections emit one block
//!    sized to the box.
//! 4. The result is classified against the previous build so callers can
//!    skip reloading when only the offset moved.

mod block;
mod builder;
mod debounce;
mod geometry;
mod request;

pub use block::{static_fragment_id, tile_fragment_id, MapBlock, StaticBlock, TileBlock};
pub use builder::{ChangeKind, RegionBuild, RegionBuilder, TileGrid, MAX_VIEW_TILES};
pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use geometry::{
    normalize_heading, pixel_span, rotate_vector, rotated_bounds, rotation_for_heading, PixelRect,
};
pub use request::RegionRequest;
