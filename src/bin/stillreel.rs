use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

use stillreel::{RenderOptions, next_output_path, render_composition};

/// Compose a still image, an audio track, and optional looping overlay clips
/// into a vertical MP4.
#[derive(Parser, Debug)]
#[command(name = "stillreel", version)]
struct Cli {
    /// Audio track (sets the video duration).
    #[arg(long)]
    audio: PathBuf,

    /// Primary still image.
    #[arg(long)]
    image: PathBuf,

    /// Semi-transparent overlay clip; repeat for multiple, bottom-most first.
    #[arg(long = "overlay")]
    overlays: Vec<PathBuf>,

    /// Explicit output file. When omitted, the next `video_N.mp4` in
    /// `--out-dir` is used.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for sequentially named outputs.
    #[arg(long, default_value = "results/videos")]
    out_dir: PathBuf,

    /// Canvas width in pixels (even).
    #[arg(long, default_value_t = stillreel::DEFAULT_WIDTH)]
    width: u32,

    /// Canvas height in pixels (even).
    #[arg(long, default_value_t = stillreel::DEFAULT_HEIGHT)]
    height: u32,

    /// Disable the grow-and-rotate intro on the image.
    #[arg(long)]
    no_intro: bool,

    /// Intro animation length in seconds (capped at a third of the audio).
    #[arg(long, default_value_t = stillreel::DEFAULT_INTRO_SECS)]
    intro_secs: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let cli = Cli::parse();

    // The destination is chosen before encoding begins.
    let out_path = match cli.out {
        Some(p) => p,
        None => {
            std::fs::create_dir_all(&cli.out_dir).with_context(|| {
                format!("create output directory '{}'", cli.out_dir.display())
            })?;
            next_output_path(&cli.out_dir, "video", "mp4")?
        }
    };

    let opts = RenderOptions {
        width: cli.width,
        height: cli.height,
        intro: !cli.no_intro,
        intro_secs: cli.intro_secs,
        overlays: cli.overlays,
        ..RenderOptions::default()
    };

    let report = render_composition(&cli.audio, &cli.image, &out_path, &opts)?;

    for skipped in &report.skipped_overlays {
        eprintln!(
            "warning: overlay '{}' skipped: {}",
            skipped.path.display(),
            skipped.reason
        );
    }
    println!("{}", report.out_path.display());
    Ok(())
}
