//! Quadkey encoding and decoding.
//!
//! Each quadkey digit interleaves one bit of the tile column (low bit of the
//! digit) and one bit of the tile row (high bit), most significant first, so
//! the string length equals the scale.

use super::types::{QuadkeyError, TileCoord, MAX_SCALE};

/// Converts tile coordinates to a quadkey.
pub fn tile_to_quadkey(tile: &TileCoord) -> Result<String, QuadkeyError> {
    if tile.scale > MAX_SCALE {
        return Err(QuadkeyError::ScaleTooLarge(tile.scale));
    }

    let tiles_per_side = 1u64 << tile.scale;
    if tile.row as u64 >= tiles_per_side || tile.column as u64 >= tiles_per_side {
        return Err(QuadkeyError::TileOutOfRange {
            row: tile.row,
            column: tile.column,
            scale: tile.scale,
        });
    }

    let mut quadkey = String::with_capacity(tile.scale as usize);
    for i in (1..=tile.scale).rev() {
        let mask = 1u32 << (i - 1);
        let mut digit = b'0';
        if tile.column & mask != 0 {
            digit += 1;
        }
        if tile.row & mask != 0 {
            digit += 2;
        }
        quadkey.push(digit as char);
    }

    Ok(quadkey)
}

/// Encodes `(scale, x, y)` as a quadkey.
pub fn encode_quadkey(scale: u8, x: u32, y: u32) -> Result<String, QuadkeyError> {
    tile_to_quadkey(&TileCoord::new(y, x, scale))
}

/// Converts a quadkey back to tile coordinates.
pub fn quadkey_to_tile(quadkey: &str) -> Result<TileCoord, QuadkeyError> {
    if quadkey.is_empty() {
        return Err(QuadkeyError::Empty);
    }
    if quadkey.len() > MAX_SCALE as usize {
        return Err(QuadkeyError::TooLong(quadkey.to_string()));
    }

    let scale = quadkey.len() as u8;
    let mut column = 0u32;
    let mut row = 0u32;

    for (position, character) in quadkey.chars().enumerate() {
        let mask = 1u32 << (scale as usize - 1 - position);
        match character {
            '0' => {}
            '1' => column |= mask,
            '2' => row |= mask,
            '3' => {
                column |= mask;
                row |= mask;
            }
            _ => {
                return Err(QuadkeyError::InvalidDigit {
                    quadkey: quadkey.to_string(),
                    character,
                    position,
                })
            }
        }
    }

    Ok(TileCoord { row, column, scale })
}

/// Decodes a quadkey into `(scale, x, y)`.
pub fn decode_quadkey(quadkey: &str) -> Result<(u8, u32, u32), QuadkeyError> {
    let tile = quadkey_to_tile(quadkey)?;
    Ok((tile.scale, tile.column, tile.row))
}
