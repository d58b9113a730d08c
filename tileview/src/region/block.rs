//! Addressable units of map imagery.

use bytes::Bytes;

use crate::coord::{encode_quadkey, LatLong};

/// Placeholder used in fragment ids when no map style is set.
const NO_STYLE: &str = "-";

/// Builds the fragment id of a tile: `{provider}:{style}:{scale}:{row}:{column}`.
pub fn tile_fragment_id(
    projection_id: &str,
    style: Option<&str>,
    scale: u8,
    row: i64,
    column: i64,
) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        projection_id,
        style.unwrap_or(NO_STYLE),
        scale,
        row,
        column
    )
}

/// Builds the fragment id of a static image.
pub fn static_fragment_id(
    projection_id: &str,
    style: Option<&str>,
    scale: u8,
    center: LatLong,
    width: u32,
    height: u32,
) -> String {
    format!(
        "{}:{}:static:{}:{:.6}:{:.6}:{}x{}",
        projection_id,
        style.unwrap_or(NO_STYLE),
        scale,
        center.lat,
        center.long,
        width,
        height
    )
}

/// One tile of a tiled region.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBlock {
    pub scale: u8,
    /// Absolute row, `0..2^scale`.
    pub row: i64,
    /// Absolute column after wraparound, `0..2^scale`.
    pub column: i64,
    /// Column before wraparound; may be negative or `>= 2^scale` when the
    /// region spans the antimeridian.
    pub unwrapped_column: i64,
    /// Zero-based row inside the emitted grid.
    pub grid_row: usize,
    /// Zero-based column inside the emitted grid, used for layout.
    pub grid_column: usize,
    /// `None` when the tile lies outside the grid at its scale.
    pub quadkey: Option<String>,
    pub fragment_id: String,
    pub image: Option<Bytes>,
}

impl TileBlock {
    /// Creates a tile block. `column` is expected to be already wrapped.
    pub fn new(
        projection_id: &str,
        style: Option<&str>,
        scale: u8,
        row: i64,
        column: i64,
    ) -> Self {
        let quadkey = match (u32::try_from(column), u32::try_from(row)) {
            (Ok(x), Ok(y)) => encode_quadkey(scale, x, y).ok(),
            _ => None,
        };

        Self {
            scale,
            row,
            column,
            unwrapped_column: column,
            grid_row: 0,
            grid_column: 0,
            quadkey,
            fragment_id: tile_fragment_id(projection_id, style, scale, row, column),
            image: None,
        }
    }

    /// Sets the unwrapped column and the position inside the emitted grid.
    pub fn positioned(mut self, unwrapped_column: i64, grid_row: usize, grid_column: usize) -> Self {
        self.unwrapped_column = unwrapped_column;
        self.grid_row = grid_row;
        self.grid_column = grid_column;
        self
    }
}

/// The single server-rendered image of a static region.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticBlock {
    pub scale: u8,
    pub center: LatLong,
    pub width: u32,
    pub height: u32,
    pub fragment_id: String,
    pub image: Option<Bytes>,
}

impl StaticBlock {
    pub fn new(
        projection_id: &str,
        style: Option<&str>,
        scale: u8,
        center: LatLong,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            scale,
            center,
            width,
            height,
            fragment_id: static_fragment_id(projection_id, style, scale, center, width, height),
            image: None,
        }
    }
}

/// An addressable unit of map imagery.
#[derive(Debug, Clone, PartialEq)]
pub enum MapBlock {
    Tile(TileBlock),
    Static(StaticBlock),
}

impl MapBlock {
    /// Display and cache key of this block.
    pub fn fragment_id(&self) -> &str {
        match self {
            MapBlock::Tile(tile) => &tile.fragment_id,
            MapBlock::Static(image) => &image.fragment_id,
        }
    }

    pub fn scale(&self) -> u8 {
        match self {
            MapBlock::Tile(tile) => tile.scale,
            MapBlock::Static(image) => image.scale,
        }
    }

    pub fn image(&self) -> Option<&Bytes> {
        match self {
            MapBlock::Tile(tile) => tile.image.as_ref(),
            MapBlock::Static(image) => image.image.as_ref(),
        }
    }

    pub fn set_image(&mut self, data: Bytes) {
        match self {
            MapBlock::Tile(tile) => tile.image = Some(data),
            MapBlock::Static(image) => image.image = Some(data),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.image().is_some()
    }

    pub fn as_tile(&self) -> Option<&TileBlock> {
        match self {
            MapBlock::Tile(tile) => Some(tile),
            MapBlock::Static(_) => None,
        }
    }

    pub fn as_static(&self) -> Option<&StaticBlock> {
        match self {
            MapBlock::Static(image) => Some(image),
            MapBlock::Tile(_) => None,
        }
    }
}
