//! Layer model and per-frame compositing.
//!
//! Z-order is fixed per run: solid background, then the primary image (with
//! the intro transform applied), then conditioned overlays in insertion
//! order. The stack is built once per run and never mutated afterwards.

use std::path::Path;

use kurbo::Affine;

use crate::{
    composite::{self, PremulImage},
    core::Canvas,
    error::{StillreelError, StillreelResult},
    intro::IntroAnimation,
    overlay::OverlayLayer,
    scale,
};

/// The primary still-image layer: aspect-fit, canvas-centered, with an
/// optional intro scale/rotation transform.
#[derive(Debug)]
pub struct PrimaryLayer {
    image: PremulImage,
    fit_scale: f64,
    intro: Option<IntroAnimation>,
}

impl PrimaryLayer {
    /// Decode the image at `path` and fit it to the canvas.
    pub fn load(path: &Path, canvas: &Canvas, intro: Option<IntroAnimation>) -> StillreelResult<Self> {
        let dyn_img = image::open(path).map_err(|e| {
            StillreelError::asset_unreadable(format!(
                "failed to decode image '{}': {e}",
                path.display()
            ))
        })?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let fit_scale = scale::fit_scale((width, height), canvas.dimensions())?;
        let image = PremulImage::from_straight_rgba8(width, height, rgba.into_raw())?;

        Ok(Self {
            image,
            fit_scale,
            intro,
        })
    }

    /// Build directly from decoded pixels. Used by tests and embedders.
    pub fn from_image(image: PremulImage, canvas: &Canvas, intro: Option<IntroAnimation>) -> StillreelResult<Self> {
        let fit_scale = scale::fit_scale((image.width, image.height), canvas.dimensions())?;
        Ok(Self {
            image,
            fit_scale,
            intro,
        })
    }

    /// Canvas-space dimensions after aspect-fit scaling (terminal pose).
    pub fn fitted_dimensions(&self) -> (u32, u32) {
        let w = (f64::from(self.image.width) * self.fit_scale).round().max(1.0) as u32;
        let h = (f64::from(self.image.height) * self.fit_scale).round().max(1.0) as u32;
        (w, h)
    }

    /// `true` once the layer's pose no longer changes with time.
    pub fn is_static_at(&self, t: f64) -> bool {
        self.intro.is_none_or(|i| !i.is_active_at(t))
    }

    /// Image-space to canvas-space transform at elapsed time `t`.
    ///
    /// Scale and rotation act about the image center, which is pinned to the
    /// canvas center.
    fn transform_at(&self, t: f64, canvas: &Canvas) -> Affine {
        let (anim_scale, rot_deg) = match self.intro {
            Some(intro) => (intro.scale_at(t), intro.rotation_deg_at(t)),
            None => (1.0, 0.0),
        };
        let s = self.fit_scale * anim_scale;
        let img_center = kurbo::Vec2::new(
            f64::from(self.image.width) / 2.0,
            f64::from(self.image.height) / 2.0,
        );

        Affine::translate(canvas.center().to_vec2())
            * Affine::rotate(rot_deg.to_radians())
            * Affine::scale(s)
            * Affine::translate(-img_center)
    }

    /// Draw the layer onto a premultiplied frame buffer.
    pub fn draw(&self, frame: &mut [u8], canvas: &Canvas, t: f64) -> StillreelResult<()> {
        composite::draw_affine_over(
            frame,
            canvas.width,
            canvas.height,
            &self.image,
            self.transform_at(t, canvas),
            1.0,
        )
    }
}

/// Composites the fixed layer stack into successive frames.
///
/// Holds the only mutable per-run state: the overlay decode streams and a
/// cache of the background+primary frame once the intro has settled.
#[derive(Debug)]
pub struct FrameComposer {
    canvas: Canvas,
    bg_rgba: [u8; 4],
    primary: PrimaryLayer,
    overlays: Vec<OverlayLayer>,
    base_cache: Option<Vec<u8>>,
}

impl FrameComposer {
    pub fn new(
        canvas: Canvas,
        bg_rgba: [u8; 4],
        primary: PrimaryLayer,
        overlays: Vec<OverlayLayer>,
    ) -> Self {
        Self {
            canvas,
            bg_rgba,
            primary,
            overlays,
            base_cache: None,
        }
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    /// Compose the frame for elapsed time `t` into `frame` (premultiplied
    /// RGBA8, canvas-sized).
    ///
    /// Must be called with monotonically increasing `t`: overlay streams are
    /// consumed one frame per call.
    pub fn compose_frame(&mut self, t: f64, frame: &mut [u8]) -> StillreelResult<()> {
        if frame.len() != self.canvas.frame_bytes() {
            return Err(StillreelError::invalid_dimensions(
                "frame buffer does not match canvas dimensions",
            ));
        }

        let settled = self.primary.is_static_at(t);
        match (&self.base_cache, settled) {
            (Some(cache), true) => frame.copy_from_slice(cache),
            _ => {
                composite::fill_rgba8(frame, self.bg_rgba);
                self.primary.draw(frame, &self.canvas, t)?;
                if settled {
                    self.base_cache = Some(frame.to_vec());
                }
            }
        }

        for overlay in &mut self.overlays {
            overlay.blend_next_onto(frame, self.canvas.width, self.canvas.height)?;
        }
        Ok(())
    }
}
