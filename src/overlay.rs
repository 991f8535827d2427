//! Overlay conditioning: loop/trim to the canvas duration, cover-scale,
//! center, and taper opacity by layer index.
//!
//! A conditioned overlay is a running `ffmpeg` decode stream that yields
//! cover-scaled RGBA frames at the output frame rate. Looping is realized by
//! `-stream_loop -1` on the source, so an overlay shorter than the canvas
//! duration repeats seamlessly from its start; a longer one is trimmed simply
//! by reading only as many frames as the run needs.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    composite,
    core::Canvas,
    error::{StillreelError, StillreelResult},
    probe, scale,
};

/// Opacity assigned to the overlay at zero-based `index`.
///
/// First overlay 0.4, each subsequent one 0.05 less, floored at 0.2, so
/// stacking many overlays never washes the composite out.
pub fn overlay_opacity(index: usize) -> f32 {
    (0.4 - 0.05 * index as f32).max(0.2)
}

/// One conditioned overlay: a decode stream plus its placement parameters.
#[derive(Debug)]
pub struct OverlayLayer {
    path: PathBuf,
    scaled_width: u32,
    scaled_height: u32,
    opacity: f32,
    child: Child,
    stdout: ChildStdout,
    frame_buf: Vec<u8>,
    exhausted: bool,
}

impl OverlayLayer {
    /// Probe and condition the overlay at `path` for the given canvas.
    ///
    /// Any failure here is isolated by the caller: the overlay is excluded
    /// and the run continues.
    pub fn condition(
        path: &Path,
        canvas: &Canvas,
        fps: u32,
        index: usize,
    ) -> StillreelResult<Self> {
        let info = probe::probe_overlay(path).map_err(|e| {
            StillreelError::overlay(format!("probe failed for '{}': {e}", path.display()))
        })?;

        let (scaled_width, scaled_height) =
            scale::cover((info.width, info.height), canvas.dimensions()).map_err(|e| {
                StillreelError::overlay(format!(
                    "cover scaling failed for '{}': {e}",
                    path.display()
                ))
            })?;

        tracing::debug!(
            path = %path.display(),
            native_secs = info.duration_secs,
            target_secs = canvas.duration_secs,
            scaled_width,
            scaled_height,
            index,
            "conditioning overlay"
        );

        let mut child = Command::new("ffmpeg")
            .args(["-loglevel", "error", "-stream_loop", "-1", "-i"])
            .arg(path)
            .args([
                "-an",
                "-vf",
                &format!("scale={scaled_width}:{scaled_height}"),
                "-r",
                &fps.to_string(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                StillreelError::overlay(format!(
                    "failed to spawn ffmpeg for '{}': {e}",
                    path.display()
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            StillreelError::overlay(format!(
                "failed to open ffmpeg stdout for '{}'",
                path.display()
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            scaled_width,
            scaled_height,
            opacity: overlay_opacity(index),
            child,
            stdout,
            frame_buf: vec![0u8; scaled_width as usize * scaled_height as usize * 4],
            exhausted: false,
        })
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Canvas-space dimensions of the cover-scaled stream.
    pub fn scaled_dimensions(&self) -> (u32, u32) {
        (self.scaled_width, self.scaled_height)
    }

    /// Read the next decoded frame and blend it, centered, onto `frame`.
    ///
    /// If the stream fails mid-run the overlay goes transparent for the rest
    /// of the run rather than aborting it.
    pub fn blend_next_onto(&mut self, frame: &mut [u8], fw: u32, fh: u32) -> StillreelResult<()> {
        if self.exhausted {
            return Ok(());
        }

        if let Err(e) = self.stdout.read_exact(&mut self.frame_buf) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "overlay stream ended early; continuing without it"
            );
            self.exhausted = true;
            let _ = self.child.kill();
            return Ok(());
        }

        composite::premultiply_rgba8_in_place(&mut self.frame_buf);
        composite::blit_centered_over(
            frame,
            fw,
            fh,
            &self.frame_buf,
            self.scaled_width,
            self.scaled_height,
            self.opacity,
        )
    }
}

impl Drop for OverlayLayer {
    // Decode streams are tied to the run; reap the child on scope exit on
    // both success and failure paths.
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
