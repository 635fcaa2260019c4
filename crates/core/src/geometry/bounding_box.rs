use serde::{Deserialize, Serialize};

/// Axis-aligned box as `(left, top, right, bottom)` in pixels.
///
/// The coordinate space is not stored in-band; callers track which space a
/// box is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest box containing every point in `points`.
    pub fn hull(points: &[(f64, f64)]) -> Self {
        let mut hull = Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            hull.left = hull.left.min(x);
            hull.top = hull.top.min(y);
            hull.right = hull.right.max(x);
            hull.bottom = hull.bottom.max(y);
        }
        hull
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.left, self.top),
            (self.right, self.top),
            (self.right, self.bottom),
            (self.left, self.bottom),
        ]
    }

    /// True when the box has no area (or is inverted, or contains NaN).
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }
}
