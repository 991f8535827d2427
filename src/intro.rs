//! The intro "grow and rotate" transform on the primary image.
//!
//! Both curves are pure functions of elapsed time: no captured state, so the
//! window can be unit-tested without building a composition.

use crate::error::{StillreelError, StillreelResult};

/// Default length of the intro window in seconds.
pub const DEFAULT_INTRO_SECS: f64 = 2.0;

/// A time-parameterized scale/rotation transform active on `[0, window)`.
///
/// Inside the window the layer grows from half size to full size while
/// completing one full clockwise turn; at the window end it reaches the
/// terminal pose (scale 1.0, rotation 0°) and holds it for the rest of the
/// timeline. Constructing a new window replaces any previous one, it does not
/// compose.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct IntroAnimation {
    window_secs: f64,
}

impl IntroAnimation {
    /// Build a window of `min(requested_secs, total_secs / 3)`.
    ///
    /// The one-third cap keeps the animation from dominating short clips.
    pub fn new(requested_secs: f64, total_secs: f64) -> StillreelResult<Self> {
        if !requested_secs.is_finite() || requested_secs <= 0.0 {
            return Err(StillreelError::validation(
                "intro animation duration must be positive and finite",
            ));
        }
        if !total_secs.is_finite() || total_secs <= 0.0 {
            return Err(StillreelError::validation(
                "total duration must be positive and finite",
            ));
        }
        Ok(Self {
            window_secs: requested_secs.min(total_secs / 3.0),
        })
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// `true` while the transform differs from identity.
    pub fn is_active_at(&self, t: f64) -> bool {
        t < self.window_secs
    }

    /// Scale factor at elapsed time `t`: 0.5 at t=0, 1.0 from the window end on.
    pub fn scale_at(&self, t: f64) -> f64 {
        if t >= self.window_secs {
            return 1.0;
        }
        0.5 + 0.5 * (t.max(0.0) / self.window_secs)
    }

    /// Rotation in degrees at elapsed time `t`: one full turn across the
    /// window, 0° from the window end on.
    pub fn rotation_deg_at(&self, t: f64) -> f64 {
        if t >= self.window_secs {
            return 0.0;
        }
        360.0 * (t.max(0.0) / self.window_secs)
    }
}
