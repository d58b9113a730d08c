//! Turns a [`RegionRequest`] into a concrete set of blocks.

use std::sync::Arc;

use tracing::debug;

use crate::coord::{PixelPoint, Projection};
use crate::range::{ClampWarning, Range};

use super::block::{MapBlock, StaticBlock, TileBlock};
use super::geometry::{normalize_heading, pixel_span, rotated_bounds, PixelRect};
use super::request::RegionRequest;

/// Largest view side, in tiles of the projection, before rotation.
///
/// Wider or taller views are clamped with a warning, which bounds a build
/// to roughly `(MAX_VIEW_TILES * 1.42 + 2)^2` blocks.
pub const MAX_VIEW_TILES: u32 = 64;

/// How a build differs from the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The request is identical to the previous one.
    NoChange,
    /// The view has zero width or height; there is nothing to draw.
    Empty,
    /// Same blocks as before, only their on-screen position moved.
    OffsetChanged,
    /// The block set changed and imagery has to be loaded.
    LoadRequired,
}

impl ChangeKind {
    pub fn requires_load(self) -> bool {
        self == ChangeKind::LoadRequired
    }
}

/// Tile index window covered by a tiled build.
///
/// Rows are absolute and lie in `[0, 2^scale]`. Columns are unwrapped: they
/// may be negative or exceed the grid when the view crosses the antimeridian.
/// Upper bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub scale: u8,
    pub top_row: i64,
    pub bottom_row: i64,
    pub left_column: i64,
    pub right_column: i64,
}

impl TileGrid {
    pub fn rows(&self) -> usize {
        (self.bottom_row - self.top_row).max(0) as usize
    }

    pub fn columns(&self) -> usize {
        (self.right_column - self.left_column).max(0) as usize
    }

    pub fn len(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBuild {
    /// The request exactly as submitted.
    pub request: RegionRequest,
    /// The request after clamping to the projection's bounds.
    pub conformed: RegionRequest,
    pub projection_id: String,
    /// Rotated bounding box in world pixels at the conformed scale.
    pub bounds: PixelRect,
    /// `None` for static and empty builds.
    pub grid: Option<TileGrid>,
    /// Blocks in row-major order.
    pub blocks: Vec<MapBlock>,
    /// Translation from the bounding box origin to the first block's origin.
    pub offset: PixelPoint,
    pub rotation: f64,
    pub change: ChangeKind,
    pub warnings: Vec<ClampWarning>,
}

impl RegionBuild {
    pub fn map_style(&self) -> Option<&str> {
        self.conformed.map_style()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn fragment_ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(MapBlock::fragment_id)
    }
}

/// Builds regions for one projection.
#[derive(Debug, Clone)]
pub struct RegionBuilder {
    projection: Arc<Projection>,
}

impl RegionBuilder {
    pub fn new(projection: Arc<Projection>) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Builds the region for `request`.
    ///
    /// `previous` is the last build returned to the caller; it is only used
    /// to classify the change. Building never fails: out-of-range input is
    /// clamped and reported in [`RegionBuild::warnings`].
    pub fn build(&self, request: &RegionRequest, previous: Option<&RegionBuild>) -> RegionBuild {
        if let Some(prev) = previous {
            if prev.request == *request && prev.projection_id == self.projection.id() {
                let mut unchanged = prev.clone();
                unchanged.change = ChangeKind::NoChange;
                return unchanged;
            }
        }

        let (conformed, warnings) = self.conform(request);
        let rotation = conformed.rotation();
        let center = self.projection.lat_long_to_pixel(
            conformed.center.lat,
            conformed.center.long,
            conformed.scale,
        );

        let mut build = RegionBuild {
            request: request.clone(),
            conformed,
            projection_id: self.projection.id().to_string(),
            bounds: PixelRect::centered(center, 0.0, 0.0),
            grid: None,
            blocks: Vec::new(),
            offset: PixelPoint::default(),
            rotation,
            change: ChangeKind::Empty,
            warnings,
        };

        if build.conformed.is_empty() {
            debug!(projection = %build.projection_id, "Empty region requested");
            return build;
        }

        build.bounds = rotated_bounds(
            center,
            build.conformed.width as f64,
            build.conformed.height as f64,
            rotation,
        );

        if self.projection.is_static() {
            self.fill_static(&mut build, previous);
        } else {
            self.fill_tiled(&mut build, previous);
        }

        debug!(
            projection = %build.projection_id,
            scale = build.conformed.scale,
            blocks = build.blocks.len(),
            change = ?build.change,
            "Region built"
        );
        build
    }

    fn conform(&self, request: &RegionRequest) -> (RegionRequest, Vec<ClampWarning>) {
        let (center, mut warnings) = self.projection.conform_lat_long(request.center);
        let scale = self
            .projection
            .conform_scale(request.scale)
            .collect_into(&mut warnings);

        let tile_size = self.projection.tile_size();
        let width = Range::new(0, tile_size.width.saturating_mul(MAX_VIEW_TILES))
            .conform(request.width, "width")
            .collect_into(&mut warnings);
        let height = Range::new(0, tile_size.height.saturating_mul(MAX_VIEW_TILES))
            .conform(request.height, "height")
            .collect_into(&mut warnings);

        let conformed = RegionRequest {
            center,
            width,
            height,
            heading: normalize_heading(request.heading),
            scale,
            map_style: request.map_style.clone(),
        };
        (conformed, warnings)
    }

    fn fill_static(&self, build: &mut RegionBuild, previous: Option<&RegionBuild>) {
        let conformed = &build.conformed;
        let width = pixel_span(build.bounds.width());
        let height = pixel_span(build.bounds.height());

        build.blocks.push(MapBlock::Static(StaticBlock::new(
            self.projection.id(),
            conformed.map_style(),
            conformed.scale as u8,
            conformed.center,
            width,
            height,
        )));

        let same_image = previous.is_some_and(|prev| {
            prev.projection_id == build.projection_id
                && !prev.blocks.is_empty()
                && prev.grid.is_none()
                && prev.bounds == build.bounds
                && prev.map_style() == conformed.map_style()
        });
        build.change = if same_image {
            ChangeKind::OffsetChanged
        } else {
            ChangeKind::LoadRequired
        };
    }

    fn fill_tiled(&self, build: &mut RegionBuild, previous: Option<&RegionBuild>) {
        let projection = &self.projection;
        let scale = build.conformed.scale;
        let tile_size = projection.tile_size();
        let (tile_width, tile_height) = (tile_size.width as f64, tile_size.height as f64);
        let tiles_per_side = projection.num_tiles_per_side(scale);

        let extent = projection.pixel_extent(scale);
        build.bounds = build
            .bounds
            .clamp_size(extent.width as f64, extent.height as f64);
        let bounds = build.bounds;

        let left_column = (bounds.left / tile_width).floor() as i64;
        let right_column =
            ((bounds.right / tile_width).ceil() as i64).min(left_column + tiles_per_side);
        let top_row = ((bounds.top / tile_height).floor() as i64).clamp(0, tiles_per_side);
        let bottom_row = ((bounds.bottom / tile_height).ceil() as i64).clamp(0, tiles_per_side);

        let grid = TileGrid {
            scale: scale as u8,
            top_row,
            bottom_row,
            left_column,
            right_column,
        };

        let style = build.conformed.map_style();
        build.blocks.reserve(grid.len());
        for row in top_row..bottom_row {
            for column in left_column..right_column {
                let wrapped = projection.wrap_column(column, scale);
                let block = TileBlock::new(projection.id(), style, grid.scale, row, wrapped)
                    .positioned(
                        column,
                        (row - top_row) as usize,
                        (column - left_column) as usize,
                    );
                build.blocks.push(MapBlock::Tile(block));
            }
        }

        let origin = projection.tile_origin(top_row, left_column);
        build.offset = PixelPoint::new(origin.x - bounds.left, origin.y - bounds.top);

        let same_tiles = previous.is_some_and(|prev| {
            prev.projection_id == build.projection_id
                && prev.change != ChangeKind::Empty
                && prev.grid == Some(grid)
                && prev.map_style() == style
        });
        build.change = if same_tiles {
            ChangeKind::OffsetChanged
        } else {
            ChangeKind::LoadRequired
        };
        build.grid = Some(grid);
    }
}
