//! Affine resampling of whole frames between coordinate spaces.
//!
//! Used to render the detector crop, the rotation-corrected portrait and
//! each classifier-input face. Every destination pixel is pulled from the
//! source through the inverse transform with bilinear interpolation.

use crate::geometry::error::GeometryError;
use crate::geometry::transform::Transform;
use crate::shared::frame::Frame;

/// Renders `src` into `dst`, where `transform` maps source pixel
/// coordinates to destination pixel coordinates.
///
/// `dst` keeps its own dimensions. Destination pixels whose preimage falls
/// outside `src` are black.
pub fn warp(src: &Frame, dst: &mut Frame, transform: &Transform) -> Result<(), GeometryError> {
    let inverse = transform.invert()?;

    let src_w = src.width() as usize;
    let src_h = src.height() as usize;
    let dst_w = dst.width() as usize;
    let dst_h = dst.height() as usize;
    let channels = src.channels().min(dst.channels()) as usize;

    if src_w == 0 || src_h == 0 {
        dst.fill(0);
        return Ok(());
    }

    let pixels = src.as_ndarray();
    let mut out = dst.as_ndarray_mut();

    for y in 0..dst_h {
        for x in 0..dst_w {
            let (sx, sy) = inverse.map_point(x as f64 + 0.5, y as f64 + 0.5);
            let inside = sx >= 0.0 && sy >= 0.0 && sx <= src_w as f64 && sy <= src_h as f64;
            if !inside {
                out.slice_mut(ndarray::s![y, x, ..]).fill(0);
                continue;
            }

            // Pixel centers sit at +0.5; interpolate between the four nearest.
            let fx = sx - 0.5;
            let fy = sy - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let ax = fx - x0;
            let ay = fy - y0;
            let clamp_x = |v: f64| (v.max(0.0) as usize).min(src_w - 1);
            let clamp_y = |v: f64| (v.max(0.0) as usize).min(src_h - 1);
            let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
            let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));

            for c in 0..channels {
                let top = pixels[[ya, xa, c]] as f64 * (1.0 - ax) + pixels[[ya, xb, c]] as f64 * ax;
                let bottom =
                    pixels[[yb, xa, c]] as f64 * (1.0 - ax) + pixels[[yb, xb, c]] as f64 * ax;
                let value = top * (1.0 - ay) + bottom * ay;
                out[[y, x, c]] = value.round().clamp(0.0, 255.0) as u8;
            }
            for c in channels..out.shape()[2] {
                out[[y, x, c]] = 0;
            }
        }
    }

    Ok(())
}
