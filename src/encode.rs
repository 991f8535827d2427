//! MP4 muxing/encoding through the system `ffmpeg` binary.
//!
//! Raw premultiplied RGBA frames are flattened over the background color and
//! streamed to ffmpeg's stdin; the audio track is muxed from its file as a
//! second input. Output goes to a temporary sibling path and is renamed into
//! place only after ffmpeg exits cleanly, so a failed run never leaves a
//! partial file at the destination.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::{
    composite,
    error::{StillreelError, StillreelResult},
};

/// Output container settings. The defaults mirror the fixed shipping
/// configuration: 24 fps h264/aac at 5000k/192k on four threads.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncodeConfig {
    pub out_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub threads: u32,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn new(out_path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            out_path: out_path.into(),
            width,
            height,
            fps: 24,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            video_bitrate: "5000k".to_string(),
            audio_bitrate: "192k".to_string(),
            threads: 4,
            overwrite: true,
        }
    }

    pub fn validate(&self) -> StillreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StillreelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(StillreelError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps == 0 {
            return Err(StillreelError::validation("encode fps must be non-zero"));
        }
        if self.threads == 0 {
            return Err(StillreelError::validation("encode threads must be non-zero"));
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(StillreelError::validation("codec names must be non-empty"));
        }
        Ok(())
    }
}

/// Streams composed frames into `ffmpeg`, muxing the audio track.
///
/// Dropping an encoder that was never [`finish`](Self::finish)ed kills the
/// child process and removes the temporary output.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    tmp_path: PathBuf,
    bg_rgba: [u8; 4],

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    frames_written: u64,
}

impl FfmpegEncoder {
    /// Spawn ffmpeg and open the frame pipe.
    pub fn start(cfg: EncodeConfig, audio_path: &Path, bg_rgba: [u8; 4]) -> StillreelResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(StillreelError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        let tmp_path = tmp_path_for(&cfg.out_path);

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-i",
        ])
        .arg(audio_path)
        .args([
            "-c:v",
            &cfg.video_codec,
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &cfg.video_bitrate,
            "-c:a",
            &cfg.audio_codec,
            "-b:a",
            &cfg.audio_bitrate,
            "-threads",
            &cfg.threads.to_string(),
            "-shortest",
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ])
        .arg(&tmp_path);

        let mut child = cmd.spawn().map_err(|e| {
            StillreelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StillreelError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StillreelError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            scratch: vec![0u8; cfg.width as usize * cfg.height as usize * 4],
            cfg,
            tmp_path,
            bg_rgba,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames_written: 0,
        })
    }

    /// Flatten and write one premultiplied RGBA frame.
    pub fn push_frame(&mut self, frame_premul: &[u8]) -> StillreelResult<()> {
        if frame_premul.len() != self.scratch.len() {
            return Err(StillreelError::validation(
                "frame size mismatch with width*height*4",
            ));
        }

        composite::flatten_premul_over_bg(&mut self.scratch, frame_premul, self.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StillreelError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            StillreelError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close the pipe, wait for ffmpeg, and move the output into place.
    pub fn finish(mut self) -> StillreelResult<PathBuf> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| StillreelError::encode("ffmpeg encoder not started"))?;

        let status = child.wait().map_err(|e| {
            StillreelError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StillreelError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| StillreelError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let _ = std::fs::remove_file(&self.tmp_path);
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(StillreelError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        std::fs::rename(&self.tmp_path, &self.cfg.out_path).map_err(|e| {
            let _ = std::fs::remove_file(&self.tmp_path);
            StillreelError::io(format!(
                "failed to move output into place at '{}': {e}",
                self.cfg.out_path.display()
            ))
        })?;

        Ok(self.cfg.out_path.clone())
    }
}

impl Drop for FfmpegEncoder {
    // Abandoned encodes (error paths, panics) must not leave a child process
    // or a stray temp file behind.
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = std::fs::remove_file(&self.tmp_path);
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

fn tmp_path_for(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "out.mp4".into());
    name.push(".part");
    out_path.with_file_name(name)
}

fn ensure_parent_dir(path: &Path) -> StillreelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            StillreelError::io(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipping_configuration() {
        let cfg = EncodeConfig::new("out.mp4", 1080, 1920);
        assert_eq!(cfg.fps, 24);
        assert_eq!(cfg.video_codec, "libx264");
        assert_eq!(cfg.audio_codec, "aac");
        assert_eq!(cfg.video_bitrate, "5000k");
        assert_eq!(cfg.audio_bitrate, "192k");
        assert_eq!(cfg.threads, 4);
        assert!(cfg.overwrite);
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut cfg = EncodeConfig::new("out.mp4", 0, 1920);
        assert!(cfg.validate().is_err());

        cfg = EncodeConfig::new("out.mp4", 1081, 1920);
        assert!(cfg.validate().is_err());

        cfg = EncodeConfig::new("out.mp4", 1080, 1920);
        cfg.fps = 0;
        assert!(cfg.validate().is_err());

        cfg = EncodeConfig::new("out.mp4", 1080, 1920);
        cfg.threads = 0;
        assert!(cfg.validate().is_err());

        cfg = EncodeConfig::new("out.mp4", 1080, 1920);
        cfg.video_codec = " ".to_string();
        assert!(cfg.validate().is_err());

        assert!(EncodeConfig::new("out.mp4", 1080, 1920).validate().is_ok());
    }

    #[test]
    fn tmp_path_is_a_sibling_with_part_suffix() {
        let tmp = tmp_path_for(Path::new("/results/videos/video_3.mp4"));
        assert_eq!(tmp, Path::new("/results/videos/video_3.mp4.part"));
    }
}
