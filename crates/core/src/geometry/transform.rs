//! 2D affine transforms between the pipeline's coordinate spaces.
//!
//! Screen convention throughout: x grows right, y grows down, and a positive
//! rotation turns clockwise on screen. All constructors are pure and the
//! type is `Copy`, so transforms can be shared freely between frames.

use super::bounding_box::BoundingBox;
use super::error::GeometryError;

/// Determinant magnitude below which a transform is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Affine map `x' = m00·x + m01·y + tx`, `y' = m10·x + m11·y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub m00: f64,
    pub m01: f64,
    pub m10: f64,
    pub m11: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            m00: 1.0,
            m01: 0.0,
            m10: 0.0,
            m11: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            tx: dx,
            ty: dy,
            ..Self::identity()
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            m00: sx,
            m11: sy,
            ..Self::identity()
        }
    }

    /// Scale by `(sx, sy)` keeping `(cx, cy)` fixed.
    pub fn scaling_about(sx: f64, sy: f64, cx: f64, cy: f64) -> Self {
        Self::translation(-cx, -cy)
            .then(&Self::scaling(sx, sy))
            .then(&Self::translation(cx, cy))
    }

    /// Rotation about the origin. Right angles use exact sine/cosine so
    /// quarter turns map integer pixels onto integer pixels.
    pub fn rotation(degrees: i32) -> Self {
        let (sin, cos) = match degrees.rem_euclid(360) {
            0 => (0.0, 1.0),
            90 => (1.0, 0.0),
            180 => (0.0, -1.0),
            270 => (-1.0, 0.0),
            other => (other as f64).to_radians().sin_cos(),
        };
        Self {
            m00: cos,
            m01: -sin,
            m10: sin,
            m11: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Rotates a `width × height` space about its center and re-centers it in
    /// the destination space. Quarter turns swap the destination dimensions.
    ///
    /// Angles that are not multiples of 90° are applied anyway, with a warning:
    /// the destination then keeps the source dimensions and corners clip.
    pub fn rotate_about_center(width: u32, height: u32, degrees: i32) -> Self {
        if degrees % 90 != 0 {
            log::warn!("Rotation of {degrees} degrees is not a multiple of 90");
        }
        let (dst_w, dst_h) = rotated_dimensions(width, height, degrees);
        Self::translation(-(width as f64) / 2.0, -(height as f64) / 2.0)
            .then(&Self::rotation(degrees))
            .then(&Self::translation(dst_w as f64 / 2.0, dst_h as f64 / 2.0))
    }

    /// Independent x/y scale from a source size to a destination size.
    ///
    /// With `preserve_aspect`, both axes use the larger factor so the
    /// destination is filled and the overflow is cropped.
    pub fn scale_to_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, preserve_aspect: bool) -> Self {
        let sx = dst_w as f64 / src_w as f64;
        let sy = dst_h as f64 / src_h as f64;
        if preserve_aspect {
            let s = sx.max(sy);
            Self::scaling(s, s)
        } else {
            Self::scaling(sx, sy)
        }
    }

    /// Front-camera reflection about the center of a `width × height` frame.
    ///
    /// A frame rotated a quarter turn is displayed sideways, so the visible
    /// horizontal flip is a flip of the sensor's y axis.
    pub fn mirror(sensor_orientation: u32, width: u32, height: u32) -> Self {
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        if is_quarter_turn(sensor_orientation as i32) {
            Self::scaling_about(1.0, -1.0, cx, cy)
        } else {
            Self::scaling_about(-1.0, 1.0, cx, cy)
        }
    }

    /// Returns the transform that applies `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            m00: next.m00 * self.m00 + next.m01 * self.m10,
            m01: next.m00 * self.m01 + next.m01 * self.m11,
            m10: next.m10 * self.m00 + next.m11 * self.m10,
            m11: next.m10 * self.m01 + next.m11 * self.m11,
            tx: next.m00 * self.tx + next.m01 * self.ty + next.tx,
            ty: next.m10 * self.tx + next.m11 * self.ty + next.ty,
        }
    }

    /// Equivalent to applying `a`, then feeding its output to `b`.
    pub fn compose(a: &Transform, b: &Transform) -> Transform {
        a.then(b)
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    pub fn invert(&self) -> Result<Transform, GeometryError> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return Err(GeometryError::SingularTransform { determinant: det });
        }
        let inv = 1.0 / det;
        let m00 = self.m11 * inv;
        let m01 = -self.m01 * inv;
        let m10 = -self.m10 * inv;
        let m11 = self.m00 * inv;
        Ok(Transform {
            m00,
            m01,
            m10,
            m11,
            tx: -(m00 * self.tx + m01 * self.ty),
            ty: -(m10 * self.tx + m11 * self.ty),
        })
    }

    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.tx,
            self.m10 * x + self.m11 * y + self.ty,
        )
    }

    /// Maps all four corners and returns their axis-aligned hull, so the
    /// result is ordered (`right >= left`, `bottom >= top`) under any
    /// rotation or reflection.
    pub fn map_box(&self, b: &BoundingBox) -> BoundingBox {
        let corners = b.corners().map(|(x, y)| self.map_point(x, y));
        BoundingBox::hull(&corners)
    }
}

/// True for 90° and 270° (modulo full turns).
pub fn is_quarter_turn(degrees: i32) -> bool {
    matches!(degrees.rem_euclid(360), 90 | 270)
}

/// Dimensions of a `width × height` space after rotating by `degrees`.
pub fn rotated_dimensions(width: u32, height: u32, degrees: i32) -> (u32, u32) {
    if is_quarter_turn(degrees) {
        (height, width)
    } else {
        (width, height)
    }
}
