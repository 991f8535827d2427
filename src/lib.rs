#![forbid(unsafe_code)]

pub mod composite;
pub mod core;
pub mod encode;
pub mod error;
pub mod intro;
pub mod layer;
pub mod namer;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod scale;

pub use crate::composite::PremulImage;
pub use crate::core::{Canvas, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use crate::encode::{EncodeConfig, FfmpegEncoder};
pub use crate::error::{StillreelError, StillreelResult};
pub use crate::intro::{DEFAULT_INTRO_SECS, IntroAnimation};
pub use crate::layer::{FrameComposer, PrimaryLayer};
pub use crate::namer::next_output_path;
pub use crate::overlay::{OverlayLayer, overlay_opacity};
pub use crate::pipeline::{RenderOptions, RenderReport, SkippedOverlay, render_composition};
pub use crate::probe::{
    AudioInfo, ImageInfo, OverlayInfo, ffmpeg_tools_available, probe_audio, probe_image,
    probe_overlay,
};
pub use crate::scale::{cover, fit_within};
