//! Aspect-preserving scaling arithmetic.
//!
//! Two policies exist: `fit_within` (letterbox/pillarbox, used for the primary
//! image) and `cover` (fill and crop, used for overlay clips).

use crate::error::{StillreelError, StillreelResult};

/// Scale `(w, h)` to the largest size that fits entirely inside `(bound_w,
/// bound_h)` while preserving aspect ratio.
pub fn fit_within(src: (u32, u32), bounds: (u32, u32)) -> StillreelResult<(u32, u32)> {
    let s = fit_scale(src, bounds)?;
    Ok(apply_scale(src, s))
}

/// Scale `(w, h)` to the smallest size that covers `(bound_w, bound_h)`
/// entirely while preserving aspect ratio. One axis may exceed the bounds;
/// centered placement crops the excess.
pub fn cover(src: (u32, u32), bounds: (u32, u32)) -> StillreelResult<(u32, u32)> {
    let s = cover_scale(src, bounds)?;
    Ok(apply_scale(src, s))
}

/// The uniform scale factor used by [`fit_within`].
pub fn fit_scale(src: (u32, u32), bounds: (u32, u32)) -> StillreelResult<f64> {
    let (sx, sy) = axis_scales(src, bounds)?;
    Ok(sx.min(sy))
}

/// The uniform scale factor used by [`cover`].
pub fn cover_scale(src: (u32, u32), bounds: (u32, u32)) -> StillreelResult<f64> {
    let (sx, sy) = axis_scales(src, bounds)?;
    Ok(sx.max(sy))
}

fn axis_scales(src: (u32, u32), bounds: (u32, u32)) -> StillreelResult<(f64, f64)> {
    let (w, h) = src;
    let (bw, bh) = bounds;
    if w == 0 || h == 0 {
        return Err(StillreelError::invalid_dimensions(format!(
            "source dimensions must be positive, got {w}x{h}"
        )));
    }
    if bw == 0 || bh == 0 {
        return Err(StillreelError::invalid_dimensions(format!(
            "target dimensions must be positive, got {bw}x{bh}"
        )));
    }
    Ok((
        f64::from(bw) / f64::from(w),
        f64::from(bh) / f64::from(h),
    ))
}

fn apply_scale(src: (u32, u32), s: f64) -> (u32, u32) {
    let w = (f64::from(src.0) * s).round().max(1.0) as u32;
    let h = (f64::from(src.1) * s).round().max(1.0) as u32;
    (w, h)
}
