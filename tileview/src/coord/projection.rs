//! Per-provider projection geometry.

use std::f64::consts::PI;

use crate::range::{ClampWarning, Conformed, Range};

use super::types::{
    LatLong, PixelExtent, PixelPoint, ProjectionKind, TileSize, MAX_LAT, MAX_LON, MAX_SCALE,
    MIN_LAT, MIN_LON,
};

/// Immutable geometry of one imagery provider.
///
/// Holds the valid geographic bounds, the supported scale span and the tile
/// pixel size, and implements the spherical Web Mercator transforms between
/// geographic and world-pixel coordinates. The scale is always passed
/// explicitly; a projection has no notion of a "current" scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    id: String,
    kind: ProjectionKind,
    lat_range: Range<f64>,
    long_range: Range<f64>,
    scale_range: Range<i32>,
    tile_size: TileSize,
    image_extension: String,
    content_type: String,
    attribution: String,
}

impl Projection {
    /// Creates a tiled Web Mercator projection with 256-pixel tiles and
    /// scales 1 to 19.
    pub fn web_mercator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProjectionKind::Tiled,
            lat_range: Range::new(MIN_LAT, MAX_LAT),
            long_range: Range::new(MIN_LON, MAX_LON),
            scale_range: Range::new(1, 19),
            tile_size: TileSize::default(),
            image_extension: "png".to_string(),
            content_type: "image/png".to_string(),
            attribution: String::new(),
        }
    }

    /// Sets how imagery is delivered.
    pub fn with_kind(mut self, kind: ProjectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Narrows the valid latitude span. It never widens past the Mercator limit.
    pub fn with_lat_range(mut self, lat_range: Range<f64>) -> Self {
        let mercator = Range::new(MIN_LAT, MAX_LAT);
        self.lat_range = Range::new(
            mercator.clamp(lat_range.minimum()),
            mercator.clamp(lat_range.maximum()),
        );
        self
    }

    pub fn with_long_range(mut self, long_range: Range<f64>) -> Self {
        let world = Range::new(MIN_LON, MAX_LON);
        self.long_range = Range::new(
            world.clamp(long_range.minimum()),
            world.clamp(long_range.maximum()),
        );
        self
    }

    /// Sets the supported scales, bounded to `[0, MAX_SCALE]`.
    pub fn with_scale_range(mut self, scale_range: Range<i32>) -> Self {
        let addressable = Range::new(0, MAX_SCALE as i32);
        self.scale_range = Range::new(
            addressable.clamp(scale_range.minimum()),
            addressable.clamp(scale_range.maximum()),
        );
        self
    }

    /// Sets the tile size. Zero dimensions are raised to one pixel.
    pub fn with_tile_size(mut self, tile_size: TileSize) -> Self {
        self.tile_size = TileSize {
            width: tile_size.width.max(1),
            height: tile_size.height.max(1),
        };
        self
    }

    pub fn with_image_format(
        mut self,
        extension: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.image_extension = extension.into();
        self.content_type = content_type.into();
        self
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    /// Short identifier used in fragment ids and cache keys.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == ProjectionKind::Static
    }

    pub fn lat_range(&self) -> Range<f64> {
        self.lat_range
    }

    pub fn long_range(&self) -> Range<f64> {
        self.long_range
    }

    pub fn scale_range(&self) -> Range<i32> {
        self.scale_range
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    /// Clamps a requested scale to the supported span, reporting if it moved.
    pub fn conform_scale(&self, scale: i32) -> Conformed<i32> {
        self.scale_range.conform(scale, "scale")
    }

    /// Clamps a position to the valid latitude/longitude bounds.
    pub fn conform_lat_long(&self, position: LatLong) -> (LatLong, Vec<ClampWarning>) {
        let mut warnings = Vec::new();
        let lat = self
            .lat_range
            .conform(position.lat, "latitude")
            .collect_into(&mut warnings);
        let long = self
            .long_range
            .conform(position.long, "longitude")
            .collect_into(&mut warnings);
        (LatLong { lat, long }, warnings)
    }

    /// Scale used by the transforms: out-of-range scales are clamped silently.
    #[inline]
    fn effective_scale(&self, scale: i32) -> u32 {
        self.scale_range.clamp(scale) as u32
    }

    /// Number of tiles along each side of the world, `2^scale`.
    #[inline]
    pub fn num_tiles_per_side(&self, scale: i32) -> i64 {
        1i64 << self.effective_scale(scale)
    }

    /// Valid tile index span `[0, 2^scale - 1]`.
    pub fn tile_range(&self, scale: i32) -> Range<i64> {
        Range::new(0, self.num_tiles_per_side(scale) - 1)
    }

    /// Size of the whole world in pixels, `tileSize × 2^scale`.
    #[inline]
    pub fn pixel_extent(&self, scale: i32) -> PixelExtent {
        let n = self.num_tiles_per_side(scale);
        PixelExtent {
            width: self.tile_size.width as i64 * n,
            height: self.tile_size.height as i64 * n,
        }
    }

    /// Forward spherical Mercator transform.
    ///
    /// Latitude and longitude are clamped to the projection's bounds first,
    /// since Web Mercator is undefined beyond roughly ±85.05°.
    pub fn lat_long_to_pixel(&self, lat: f64, long: f64, scale: i32) -> PixelPoint {
        let lat = self.lat_range.clamp(lat);
        let long = self.long_range.clamp(long);
        let extent = self.pixel_extent(scale);

        let x = extent.width as f64 * (long / 360.0 + 0.5);

        let lat_rad = lat * PI / 180.0;
        let mercator = (PI / 4.0 + lat_rad / 2.0).tan().ln();
        let y = extent.height as f64 * (0.5 - mercator / (2.0 * PI));

        PixelPoint { x, y }
    }

    /// Inverse spherical Mercator transform.
    ///
    /// `x`/`y` are clamped to the world extent at `scale` first.
    pub fn pixel_to_lat_long(&self, x: f64, y: f64, scale: i32) -> LatLong {
        let extent = self.pixel_extent(scale);
        let x = Range::new(0.0, extent.width as f64).clamp(x);
        let y = Range::new(0.0, extent.height as f64).clamp(y);

        let long = (x / extent.width as f64 - 0.5) * 360.0;

        let mercator = (0.5 - y / extent.height as f64) * 2.0 * PI;
        let lat_rad = 2.0 * mercator.exp().atan() - PI / 2.0;
        let lat = lat_rad * 180.0 / PI;

        LatLong {
            lat: self.lat_range.clamp(lat),
            long: self.long_range.clamp(long),
        }
    }

    /// Tile `(row, column)` containing a pixel. Not wrapped or clamped.
    pub fn pixel_to_tile(&self, point: PixelPoint) -> (i64, i64) {
        let row = (point.y / self.tile_size.height as f64).floor() as i64;
        let column = (point.x / self.tile_size.width as f64).floor() as i64;
        (row, column)
    }

    /// World pixel position of a tile's north-west corner.
    pub fn tile_origin(&self, row: i64, column: i64) -> PixelPoint {
        PixelPoint {
            x: (column * self.tile_size.width as i64) as f64,
            y: (row * self.tile_size.height as i64) as f64,
        }
    }

    /// Maps any column index onto `[0, 2^scale)` across the antimeridian.
    #[inline]
    pub fn wrap_column(&self, column: i64, scale: i32) -> i64 {
        column.rem_euclid(self.num_tiles_per_side(scale))
    }
}
