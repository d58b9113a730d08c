//! Immutable description of a requested map view.

use serde::{Deserialize, Serialize};

use crate::coord::{LatLong, Projection};

use super::geometry::{normalize_heading, rotate_vector, rotation_for_heading};

/// The view a caller wants to see.
///
/// A request is a plain value: changing any part of the view means building a
/// new request. The heading is normalized to `[0, 360)` on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub center: LatLong,
    /// View width in screen pixels.
    pub width: u32,
    /// View height in screen pixels.
    pub height: u32,
    /// Heading in degrees, `[0, 360)`.
    pub heading: f64,
    pub scale: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_style: Option<String>,
}

impl RegionRequest {
    pub fn new(center: LatLong, width: u32, height: u32, scale: i32) -> Self {
        Self {
            center,
            width,
            height,
            heading: 0.0,
            scale,
            map_style: None,
        }
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = normalize_heading(heading);
        self
    }

    pub fn with_map_style(mut self, style: impl Into<String>) -> Self {
        self.map_style = Some(style.into());
        self
    }

    pub fn with_center(mut self, center: LatLong) -> Self {
        self.center = center;
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Draw-time rotation, `(360 - heading) mod 360`.
    pub fn rotation(&self) -> f64 {
        rotation_for_heading(self.heading)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn map_style(&self) -> Option<&str> {
        self.map_style.as_deref()
    }

    /// Returns a request whose center is moved by a screen-space offset.
    ///
    /// The offset is rotated into world pixel space by the current rotation
    /// before it is applied, so dragging follows the rotated map.
    pub fn nudged(&self, projection: &Projection, dx: f64, dy: f64) -> Self {
        let (px, py) = rotate_vector(dx, dy, self.rotation());
        let pixel = projection.lat_long_to_pixel(self.center.lat, self.center.long, self.scale);
        let center = projection.pixel_to_lat_long(pixel.x + px, pixel.y + py, self.scale);
        self.clone().with_center(center)
    }
}
