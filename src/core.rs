use crate::error::{StillreelError, StillreelResult};

pub use kurbo::{Affine, Point, Vec2};

/// Default portrait canvas, sized for vertical/mobile playback.
pub const DEFAULT_WIDTH: u32 = 1080;
pub const DEFAULT_HEIGHT: u32 = 1920;

/// Output frame rate in frames per second.
pub const DEFAULT_FPS: u32 = 24;

/// The output canvas: fixed pixel dimensions plus the run's duration.
///
/// The duration is set exactly once, from the probed audio length, before any
/// layer is conditioned. Every layer in the composition ultimately spans it.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels (even, required for yuv420p output).
    pub width: u32,
    /// Height in pixels (even, required for yuv420p output).
    pub height: u32,
    /// Total duration in seconds, taken from the audio track.
    pub duration_secs: f64,
}

impl Canvas {
    /// Create a validated canvas.
    pub fn new(width: u32, height: u32, duration_secs: f64) -> StillreelResult<Self> {
        if width == 0 || height == 0 {
            return Err(StillreelError::validation("canvas width/height must be > 0"));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(StillreelError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(StillreelError::validation(
                "canvas duration must be positive and finite",
            ));
        }
        Ok(Self {
            width,
            height,
            duration_secs,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Canvas center in pixel coordinates.
    pub fn center(&self) -> Point {
        Point::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }

    /// Number of frames needed to cover the duration at `fps`.
    ///
    /// Ceiling semantics: the last frame may extend slightly past the audio;
    /// the encoder's `-shortest` clamps the container to the audio length.
    pub fn frame_count(&self, fps: u32) -> u64 {
        (self.duration_secs * f64::from(fps)).ceil().max(1.0) as u64
    }

    /// Byte length of one RGBA8 frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
