//! CPU alpha compositing over premultiplied RGBA8 buffers.
//!
//! Every frame buffer in the pipeline is premultiplied, row-major, tightly
//! packed. Layer opacity is applied at blend time.

use kurbo::{Affine, Point};

use crate::error::{StillreelError, StillreelResult};

pub type PremulRgba8 = [u8; 4];

/// A decoded still image, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct PremulImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl PremulImage {
    pub fn from_straight_rgba8(width: u32, height: u32, mut rgba8: Vec<u8>) -> StillreelResult<Self> {
        if rgba8.len() != width as usize * height as usize * 4 {
            return Err(StillreelError::invalid_dimensions(
                "rgba8 buffer does not match width*height*4",
            ));
        }
        premultiply_rgba8_in_place(&mut rgba8);
        Ok(Self {
            width,
            height,
            rgba8_premul: rgba8,
        })
    }
}

/// Standard "over" blend of one premultiplied pixel onto another.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - sa;

    let mut out = [0u8; 4];
    out[3] = add_clamp_255(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_clamp_255(sc, dc);
    }
    out
}

// Channel sums clamp at 255, never wrap: rounding in mul_div255 can push a
// premultiplied sum one past the top.
fn add_clamp_255(a: u16, b: u16) -> u8 {
    (a + b).min(255) as u8
}

/// Fill a frame buffer with a straight-alpha color (premultiplied on write).
pub fn fill_rgba8(frame: &mut [u8], rgba_straight: [u8; 4]) {
    let a = u16::from(rgba_straight[3]);
    let px = [
        mul_div255(u16::from(rgba_straight[0]), a) as u8,
        mul_div255(u16::from(rgba_straight[1]), a) as u8,
        mul_div255(u16::from(rgba_straight[2]), a) as u8,
        rgba_straight[3],
    ];
    for d in frame.chunks_exact_mut(4) {
        d.copy_from_slice(&px);
    }
}

/// Convert a straight-alpha RGBA8 buffer to premultiplied in place.
pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Blend `src` (premultiplied, `sw`x`sh`) onto the frame, centered.
///
/// Sources larger than the frame are cropped symmetrically; smaller sources
/// leave untouched margins. Used for conditioned overlays, whose cover
/// scaling makes them at least canvas-sized on both axes.
pub fn blit_centered_over(
    frame: &mut [u8],
    fw: u32,
    fh: u32,
    src: &[u8],
    sw: u32,
    sh: u32,
    opacity: f32,
) -> StillreelResult<()> {
    if frame.len() != fw as usize * fh as usize * 4 {
        return Err(StillreelError::invalid_dimensions(
            "frame buffer does not match frame dimensions",
        ));
    }
    if src.len() != sw as usize * sh as usize * 4 {
        return Err(StillreelError::invalid_dimensions(
            "source buffer does not match source dimensions",
        ));
    }

    // Signed offsets of the source origin relative to the frame origin.
    let off_x = (i64::from(fw) - i64::from(sw)) / 2;
    let off_y = (i64::from(fh) - i64::from(sh)) / 2;

    for fy in 0..i64::from(fh) {
        let sy = fy - off_y;
        if sy < 0 || sy >= i64::from(sh) {
            continue;
        }
        for fx in 0..i64::from(fw) {
            let sx = fx - off_x;
            if sx < 0 || sx >= i64::from(sw) {
                continue;
            }
            let di = ((fy * i64::from(fw) + fx) * 4) as usize;
            let si = ((sy * i64::from(sw) + sx) * 4) as usize;
            let out = over(
                [frame[di], frame[di + 1], frame[di + 2], frame[di + 3]],
                [src[si], src[si + 1], src[si + 2], src[si + 3]],
                opacity,
            );
            frame[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

/// Draw a premultiplied image onto the frame through an affine transform,
/// with bilinear sampling.
///
/// `transform` maps image pixel coordinates to frame pixel coordinates. The
/// loop runs inverse-mapped over the transformed bounding box only.
pub fn draw_affine_over(
    frame: &mut [u8],
    fw: u32,
    fh: u32,
    img: &PremulImage,
    transform: Affine,
    opacity: f32,
) -> StillreelResult<()> {
    if frame.len() != fw as usize * fh as usize * 4 {
        return Err(StillreelError::invalid_dimensions(
            "frame buffer does not match frame dimensions",
        ));
    }
    if img.rgba8_premul.len() != img.width as usize * img.height as usize * 4 {
        return Err(StillreelError::invalid_dimensions(
            "image buffer does not match image dimensions",
        ));
    }

    if transform.determinant().abs() < 1e-12 {
        // Degenerate transform draws nothing.
        return Ok(());
    }
    let inv = transform.inverse();

    let (x0, y0, x1, y1) = transformed_bounds(img.width, img.height, transform, fw, fh);

    let iw = f64::from(img.width);
    let ih = f64::from(img.height);

    for fy in y0..y1 {
        for fx in x0..x1 {
            let p = inv * Point::new(f64::from(fx) + 0.5, f64::from(fy) + 0.5);
            if p.x < 0.0 || p.y < 0.0 || p.x >= iw || p.y >= ih {
                continue;
            }
            let src = sample_bilinear(img, p.x, p.y);
            if src[3] == 0 {
                continue;
            }
            let di = ((fy as usize * fw as usize) + fx as usize) * 4;
            let out = over(
                [frame[di], frame[di + 1], frame[di + 2], frame[di + 3]],
                src,
                opacity,
            );
            frame[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

fn transformed_bounds(w: u32, h: u32, transform: Affine, fw: u32, fh: u32) -> (u32, u32, u32, u32) {
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(f64::from(w), 0.0),
        Point::new(0.0, f64::from(h)),
        Point::new(f64::from(w), f64::from(h)),
    ];
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in corners {
        let p = transform * c;
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(fw);
    let y1 = (max_y.ceil().max(0.0) as u32).min(fh);
    (x0, y0, x1.max(x0), y1.max(y0))
}

/// Bilinear sample at image coordinates (`x`, `y`), pixel centers at +0.5.
fn sample_bilinear(img: &PremulImage, x: f64, y: f64) -> PremulRgba8 {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let px = |ix: i64, iy: i64| -> [f64; 4] {
        let ix = ix.clamp(0, i64::from(img.width) - 1) as usize;
        let iy = iy.clamp(0, i64::from(img.height) - 1) as usize;
        let i = (iy * img.width as usize + ix) * 4;
        let b = &img.rgba8_premul[i..i + 4];
        [
            f64::from(b[0]),
            f64::from(b[1]),
            f64::from(b[2]),
            f64::from(b[3]),
        ]
    };

    let x0i = x0 as i64;
    let y0i = y0 as i64;
    let p00 = px(x0i, y0i);
    let p10 = px(x0i + 1, y0i);
    let p01 = px(x0i, y0i + 1);
    let p11 = px(x0i + 1, y0i + 1);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = p00[i] + (p10[i] - p00[i]) * tx;
        let bot = p01[i] + (p11[i] - p01[i]) * tx;
        out[i] = (top + (bot - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Flatten a premultiplied frame over an opaque background color, producing
/// the opaque RGBA8 bytes the encoder consumes.
pub fn flatten_premul_over_bg(dst: &mut [u8], src_premul: &[u8], bg_rgba: [u8; 4]) -> StillreelResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(StillreelError::invalid_dimensions(
            "flatten expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;
        let r = s[0] as u16 + mul_div255(bg_r, inv);
        let g = s[1] as u16 + mul_div255(bg_g, inv);
        let b = s[2] as u16 + mul_div255(bg_b, inv);

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        let src = [255, 255, 255, 0];
        assert_eq!(over(dst, src, 1.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_clamps_hot_sums_to_255() {
        // Not premul-consistent on purpose: straight white at half alpha over
        // opaque white sums past 255 per channel (255 + 127) and must clamp,
        // not wrap.
        let dst = [255, 255, 255, 255];
        let out = over(dst, [255, 255, 255, 128], 1.0);
        assert_eq!(out, [255, 255, 255, 255]);
    }

    #[test]
    fn over_half_opacity_over_black_halves_src() {
        let dst = [0, 0, 0, 255];
        let out = over(dst, [255, 0, 0, 255], 0.5);
        assert_eq!(out[3], 255);
        assert!((i32::from(out[0]) - 128).abs() <= 1);
    }

    #[test]
    fn fill_premultiplies_color() {
        let mut frame = vec![9u8; 8];
        fill_rgba8(&mut frame, [255, 0, 0, 128]);
        // 255 * 128/255 = 128 premultiplied.
        assert_eq!(&frame[0..4], &[128, 0, 0, 128]);
        assert_eq!(&frame[4..8], &[128, 0, 0, 128]);
    }

    #[test]
    fn premultiply_in_place_zeroes_fully_transparent() {
        let mut buf = vec![200u8, 100, 50, 0, 200, 100, 50, 255];
        premultiply_rgba8_in_place(&mut buf);
        assert_eq!(&buf[0..4], &[0, 0, 0, 0]);
        assert_eq!(&buf[4..8], &[200, 100, 50, 255]);
    }

    #[test]
    fn blit_crops_oversized_source_symmetrically() {
        // 2x2 frame, 4x2 source: the centered 2x2 window is columns 1..3.
        let mut frame = vec![0u8; 2 * 2 * 4];
        let mut src = Vec::new();
        for v in [10u8, 20, 30, 40, 10, 20, 30, 40] {
            src.extend_from_slice(&[v, 0, 0, 255]);
        }
        blit_centered_over(&mut frame, 2, 2, &src, 4, 2, 1.0).unwrap();
        assert_eq!(frame[0], 20);
        assert_eq!(frame[4], 30);
        assert_eq!(frame[8], 20);
        assert_eq!(frame[12], 30);
    }

    #[test]
    fn blit_leaves_margins_for_small_source() {
        // 4x4 frame, 2x2 opaque white source centered at rows/cols 1..3.
        let mut frame = vec![0u8; 4 * 4 * 4];
        let src = vec![255u8; 2 * 2 * 4];
        blit_centered_over(&mut frame, 4, 4, &src, 2, 2, 1.0).unwrap();

        let px = |x: usize, y: usize| frame[(y * 4 + x) * 4];
        assert_eq!(px(0, 0), 0);
        assert_eq!(px(3, 3), 0);
        assert_eq!(px(1, 1), 255);
        assert_eq!(px(2, 2), 255);
    }

    #[test]
    fn blit_rejects_mismatched_buffers() {
        let mut frame = vec![0u8; 4];
        let src = vec![0u8; 3];
        assert!(blit_centered_over(&mut frame, 1, 1, &src, 1, 1, 1.0).is_err());
    }

    #[test]
    fn draw_identity_affine_copies_pixels() {
        let img = PremulImage::from_straight_rgba8(
            2,
            2,
            vec![
                255, 0, 0, 255, //
                0, 255, 0, 255, //
                0, 0, 255, 255, //
                255, 255, 255, 255,
            ],
        )
        .unwrap();
        let mut frame = vec![0u8; 2 * 2 * 4];
        draw_affine_over(&mut frame, 2, 2, &img, Affine::IDENTITY, 1.0).unwrap();
        assert_eq!(&frame[0..4], &[255, 0, 0, 255]);
        assert_eq!(&frame[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn draw_translated_image_lands_offset() {
        let img =
            PremulImage::from_straight_rgba8(1, 1, vec![255, 255, 255, 255]).unwrap();
        let mut frame = vec![0u8; 3 * 3 * 4];
        draw_affine_over(&mut frame, 3, 3, &img, Affine::translate((2.0, 2.0)), 1.0).unwrap();
        assert_eq!(frame[(2 * 3 + 2) * 4], 255);
        assert_eq!(frame[0], 0);
    }

    #[test]
    fn draw_degenerate_transform_is_noop() {
        let img =
            PremulImage::from_straight_rgba8(1, 1, vec![255, 255, 255, 255]).unwrap();
        let mut frame = vec![0u8; 4];
        draw_affine_over(&mut frame, 1, 1, &img, Affine::scale(0.0), 1.0).unwrap();
        assert_eq!(frame, vec![0u8; 4]);
    }

    #[test]
    fn flatten_premul_alpha_0_returns_bg() {
        let src = vec![0u8, 0, 0, 0];
        let mut dst = vec![0u8; 4];
        flatten_premul_over_bg(&mut dst, &src, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn flatten_premul_alpha_255_is_identity() {
        let src = vec![1u8, 2, 3, 255];
        let mut dst = vec![0u8; 4];
        flatten_premul_over_bg(&mut dst, &src, [10, 20, 30, 255]).unwrap();
        assert_eq!(dst, src);
    }
}
