//! Planar geometry in world pixel space.

use crate::coord::PixelPoint;

/// Coordinates are snapped to `1 / SNAP_SCALE` pixels so that trigonometric noise
/// (e.g. `cos(90°) ≈ 6e-17`) never pushes an edge across a tile boundary.
const SNAP_SCALE: f64 = 1e6;

#[inline]
fn snap(value: f64) -> f64 {
    (value * SNAP_SCALE).round() / SNAP_SCALE
}

/// Whole pixels needed to cover `length`, ignoring sub-snap noise.
#[inline]
pub fn pixel_span(length: f64) -> u32 {
    snap(length).ceil().max(0.0) as u32
}

/// Normalizes a heading in degrees to `[0, 360)`.
#[inline]
pub fn normalize_heading(heading: f64) -> f64 {
    if !heading.is_finite() {
        return 0.0;
    }
    let normalized = heading.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Rotation applied at draw time for a heading: `(360 - heading) mod 360`.
#[inline]
pub fn rotation_for_heading(heading: f64) -> f64 {
    normalize_heading(360.0 - normalize_heading(heading))
}

/// Rotates the vector `(dx, dy)` by `degrees` using the standard 2D
/// rotation matrix.
pub fn rotate_vector(dx: f64, dy: f64, degrees: f64) -> (f64, f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (dx * cos - dy * sin, dx * sin + dy * cos)
}

/// Axis-aligned rectangle in world pixels. `left <= right`, `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PixelRect {
    /// Rectangle of `width × height` centered on `center`.
    pub fn centered(center: PixelPoint, width: f64, height: f64) -> Self {
        Self {
            left: center.x - width / 2.0,
            top: center.y - height / 2.0,
            right: center.x + width / 2.0,
            bottom: center.y + height / 2.0,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> PixelPoint {
        PixelPoint {
            x: (self.left + self.right) / 2.0,
            y: (self.top + self.bottom) / 2.0,
        }
    }

    pub fn corners(&self) -> [PixelPoint; 4] {
        [
            PixelPoint::new(self.left, self.top),
            PixelPoint::new(self.right, self.top),
            PixelPoint::new(self.right, self.bottom),
            PixelPoint::new(self.left, self.bottom),
        ]
    }

    /// Smallest axis-aligned rectangle containing all `points`.
    pub fn bounding(points: &[PixelPoint]) -> Self {
        let mut rect = Self {
            left: f64::INFINITY,
            top: f64::INFINITY,
            right: f64::NEG_INFINITY,
            bottom: f64::NEG_INFINITY,
        };
        for p in points {
            rect.left = rect.left.min(p.x);
            rect.top = rect.top.min(p.y);
            rect.right = rect.right.max(p.x);
            rect.bottom = rect.bottom.max(p.y);
        }
        rect
    }

    /// Shrinks each dimension to at most the given size, keeping the center.
    pub fn clamp_size(&self, max_width: f64, max_height: f64) -> Self {
        let center = self.center();
        Self::centered(
            center,
            self.width().min(max_width),
            self.height().min(max_height),
        )
        .snapped()
    }

    fn snapped(self) -> Self {
        Self {
            left: snap(self.left),
            top: snap(self.top),
            right: snap(self.right),
            bottom: snap(self.bottom),
        }
    }
}

/// Bounding box of a `width × height` rectangle centered on `center` after
/// rotating it by `rotation` degrees about that center.
pub fn rotated_bounds(center: PixelPoint, width: f64, height: f64, rotation: f64) -> PixelRect {
    let corners = PixelRect::centered(center, width, height)
        .corners()
        .map(|corner| {
            let (dx, dy) = rotate_vector(corner.x - center.x, corner.y - center.y, rotation);
            PixelPoint::new(center.x + dx, center.y + dy)
        });
    PixelRect::bounding(&corners).snapped()
}
