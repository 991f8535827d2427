//! The single-threaded compositing pipeline: probe, build layers, condition
//! overlays, compose frames, encode.

use std::path::{Path, PathBuf};

use crate::{
    core::{Canvas, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH},
    encode::{EncodeConfig, FfmpegEncoder},
    error::StillreelResult,
    intro::{DEFAULT_INTRO_SECS, IntroAnimation},
    layer::{FrameComposer, PrimaryLayer},
    overlay::OverlayLayer,
    probe,
};

/// Caller-facing configuration. Everything is optional with defaults; the
/// defaults reproduce the shipping vertical-video setup.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderOptions {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Whether the primary image gets the grow-and-rotate intro.
    pub intro: bool,
    /// Requested intro length in seconds (capped at a third of the audio).
    pub intro_secs: f64,
    /// Overlay clip paths, bottom-most first.
    pub overlays: Vec<PathBuf>,
    /// Background color, straight-alpha RGBA.
    pub bg_rgba: [u8; 4],
    /// Encoder worker threads.
    pub threads: u32,
    /// Overwrite an existing file at the output path.
    pub overwrite: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            intro: true,
            intro_secs: DEFAULT_INTRO_SECS,
            overlays: Vec::new(),
            bg_rgba: [0, 0, 0, 255],
            threads: 4,
            overwrite: true,
        }
    }
}

/// An overlay excluded from the run, with the reason, surfaced to the caller
/// rather than silently dropped.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SkippedOverlay {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one completed run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderReport {
    pub out_path: PathBuf,
    pub duration_secs: f64,
    pub frames_written: u64,
    pub overlays_used: usize,
    pub skipped_overlays: Vec<SkippedOverlay>,
}

/// Compose `image_path` over the configured background, under the configured
/// overlays, synchronized to `audio_path`, and encode to `out_path`.
///
/// Primary-asset failures abort before any output file exists. Per-overlay
/// failures degrade gracefully: the overlay is skipped and reported.
#[tracing::instrument(skip(opts), fields(out = %out_path.display()))]
pub fn render_composition(
    audio_path: &Path,
    image_path: &Path,
    out_path: &Path,
    opts: &RenderOptions,
) -> StillreelResult<RenderReport> {
    let audio = probe::probe_audio(audio_path)?;
    tracing::info!(duration_secs = audio.duration_secs, "probed audio");

    // The canvas duration is fixed here, once, before any layer exists.
    let canvas = Canvas::new(opts.width, opts.height, audio.duration_secs)?;

    let intro = if opts.intro {
        let anim = IntroAnimation::new(opts.intro_secs, canvas.duration_secs)?;
        tracing::info!(window_secs = anim.window_secs(), "intro animation enabled");
        Some(anim)
    } else {
        None
    };

    let primary = PrimaryLayer::load(image_path, &canvas, intro)?;
    let (fit_w, fit_h) = primary.fitted_dimensions();
    tracing::info!(fit_w, fit_h, "loaded primary image");

    let mut overlays = Vec::new();
    let mut skipped = Vec::new();
    for (index, path) in opts.overlays.iter().enumerate() {
        match OverlayLayer::condition(path, &canvas, opts.fps, index) {
            Ok(layer) => overlays.push(layer),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping overlay");
                skipped.push(SkippedOverlay {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    let overlays_used = overlays.len();

    let mut cfg = EncodeConfig::new(out_path, canvas.width, canvas.height);
    cfg.fps = opts.fps;
    cfg.threads = opts.threads;
    cfg.overwrite = opts.overwrite;

    let mut composer = FrameComposer::new(canvas, opts.bg_rgba, primary, overlays);
    let mut encoder = FfmpegEncoder::start(cfg, audio_path, opts.bg_rgba)?;

    let frame_count = canvas.frame_count(opts.fps);
    tracing::info!(frame_count, overlays_used, "encoding");

    let mut frame = vec![0u8; canvas.frame_bytes()];
    for idx in 0..frame_count {
        let t = idx as f64 / f64::from(opts.fps);
        composer.compose_frame(t, &mut frame)?;
        encoder.push_frame(&frame)?;
    }

    let frames_written = encoder.frames_written();
    let out_path = encoder.finish()?;
    tracing::info!(frames_written, out = %out_path.display(), "render complete");

    Ok(RenderReport {
        out_path,
        duration_secs: audio.duration_secs,
        frames_written,
        overlays_used,
        skipped_overlays: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StillreelError;

    #[test]
    fn defaults_are_the_shipping_setup() {
        let opts = RenderOptions::default();
        assert_eq!((opts.width, opts.height), (1080, 1920));
        assert_eq!(opts.fps, 24);
        assert!(opts.intro);
        assert_eq!(opts.intro_secs, 2.0);
        assert!(opts.overlays.is_empty());
        assert_eq!(opts.bg_rgba, [0, 0, 0, 255]);
        assert_eq!(opts.threads, 4);
    }

    #[test]
    fn missing_audio_aborts_without_output() {
        let tmp = std::env::temp_dir().join(format!(
            "stillreel_pipeline_no_audio_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let out = tmp.join("video_1.mp4");

        let err = render_composition(
            Path::new("/nonexistent/speech_1.mp3"),
            Path::new("/nonexistent/image_1.png"),
            &out,
            &RenderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StillreelError::AssetUnreadable(_)));
        assert!(!out.exists());
    }
}
