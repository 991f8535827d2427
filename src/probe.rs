use std::path::Path;

use crate::error::{StillreelError, StillreelResult};

/// Probed audio track metadata.
#[derive(Clone, Copy, Debug)]
pub struct AudioInfo {
    /// Duration in seconds (fractional).
    pub duration_secs: f64,
}

/// Probed still-image metadata.
#[derive(Clone, Copy, Debug)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Probed overlay clip metadata.
#[derive(Clone, Debug)]
pub struct OverlayInfo {
    pub width: u32,
    pub height: u32,
    /// Native clip duration in seconds.
    pub duration_secs: f64,
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ffmpeg_tools_available() -> bool {
    let ok = |bin: &str| {
        std::process::Command::new(bin)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    ok("ffmpeg") && ok("ffprobe")
}

/// Determine the duration of an audio file through `ffprobe`.
///
/// Fails with [`StillreelError::AssetUnreadable`] if the file is missing,
/// empty, or not decodable as audio.
pub fn probe_audio(path: &Path) -> StillreelResult<AudioInfo> {
    let parsed = ffprobe_json(path)?;

    if !parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"))
    {
        return Err(StillreelError::asset_unreadable(format!(
            "'{}' contains no audio stream",
            path.display()
        )));
    }

    let duration_secs = parsed.duration_secs().ok_or_else(|| {
        StillreelError::asset_unreadable(format!(
            "'{}' has no parseable duration",
            path.display()
        ))
    })?;
    if duration_secs <= 0.0 {
        return Err(StillreelError::asset_unreadable(format!(
            "'{}' has non-positive duration",
            path.display()
        )));
    }

    Ok(AudioInfo { duration_secs })
}

/// Determine the intrinsic pixel dimensions of a raster image.
pub fn probe_image(path: &Path) -> StillreelResult<ImageInfo> {
    require_nonempty_file(path)?;

    let (width, height) = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| {
            StillreelError::asset_unreadable(format!(
                "failed to open image '{}': {e}",
                path.display()
            ))
        })?
        .into_dimensions()
        .map_err(|e| {
            StillreelError::asset_unreadable(format!(
                "failed to decode image '{}': {e}",
                path.display()
            ))
        })?;

    if width == 0 || height == 0 {
        return Err(StillreelError::invalid_dimensions(format!(
            "image '{}' has a zero dimension ({width}x{height})",
            path.display()
        )));
    }

    Ok(ImageInfo { width, height })
}

/// Probe an overlay clip's dimensions and native duration through `ffprobe`.
pub fn probe_overlay(path: &Path) -> StillreelResult<OverlayInfo> {
    let parsed = ffprobe_json(path)?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            StillreelError::asset_unreadable(format!(
                "'{}' contains no video stream",
                path.display()
            ))
        })?;

    let width = video.width.ok_or_else(|| {
        StillreelError::asset_unreadable(format!(
            "'{}' is missing video width metadata",
            path.display()
        ))
    })?;
    let height = video.height.ok_or_else(|| {
        StillreelError::asset_unreadable(format!(
            "'{}' is missing video height metadata",
            path.display()
        ))
    })?;
    if width == 0 || height == 0 {
        return Err(StillreelError::invalid_dimensions(format!(
            "overlay '{}' has a zero dimension ({width}x{height})",
            path.display()
        )));
    }

    let duration_secs = video
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| parsed.duration_secs())
        .ok_or_else(|| {
            StillreelError::asset_unreadable(format!(
                "'{}' has no parseable duration",
                path.display()
            ))
        })?;
    if duration_secs <= 0.0 {
        return Err(StillreelError::asset_unreadable(format!(
            "'{}' has non-positive duration",
            path.display()
        )));
    }

    Ok(OverlayInfo {
        width,
        height,
        duration_secs,
    })
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

impl ProbeOut {
    fn duration_secs(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
    }
}

fn ffprobe_json(path: &Path) -> StillreelResult<ProbeOut> {
    require_nonempty_file(path)?;

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            StillreelError::io(format!(
                "failed to run ffprobe (is it installed and on PATH?): {e}"
            ))
        })?;
    if !out.status.success() {
        return Err(StillreelError::asset_unreadable(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    serde_json::from_slice(&out.stdout).map_err(|e| {
        StillreelError::asset_unreadable(format!(
            "ffprobe json parse failed for '{}': {e}",
            path.display()
        ))
    })
}

fn require_nonempty_file(path: &Path) -> StillreelResult<()> {
    let meta = std::fs::metadata(path).map_err(|_| {
        StillreelError::asset_unreadable(format!("file not found: '{}'", path.display()))
    })?;
    if !meta.is_file() || meta.len() == 0 {
        return Err(StillreelError::asset_unreadable(format!(
            "'{}' is empty or not a regular file",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "stillreel_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn missing_audio_is_asset_unreadable() {
        let err = probe_audio(Path::new("/nonexistent/speech_1.mp3")).unwrap_err();
        assert!(matches!(err, StillreelError::AssetUnreadable(_)));
    }

    #[test]
    fn empty_file_is_asset_unreadable() {
        let tmp = temp_dir("probe_empty");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("empty.mp3");
        std::fs::write(&path, b"").unwrap();

        let err = probe_audio(&path).unwrap_err();
        assert!(matches!(err, StillreelError::AssetUnreadable(_)));
    }

    #[test]
    fn missing_image_is_asset_unreadable() {
        let err = probe_image(Path::new("/nonexistent/image_1.png")).unwrap_err();
        assert!(matches!(err, StillreelError::AssetUnreadable(_)));
    }

    #[test]
    fn garbage_image_is_asset_unreadable() {
        let tmp = temp_dir("probe_garbage");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("img.png");
        std::fs::write(&path, b"not a png at all").unwrap();

        let err = probe_image(&path).unwrap_err();
        assert!(matches!(err, StillreelError::AssetUnreadable(_)));
    }

    #[test]
    fn probe_image_reads_png_dimensions() {
        let tmp = temp_dir("probe_png");
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("img.png");

        let img = image::RgbaImage::from_raw(3, 2, vec![255u8; 3 * 2 * 4]).unwrap();
        image::DynamicImage::ImageRgba8(img).save(&path).unwrap();

        let info = probe_image(&path).unwrap();
        assert_eq!((info.width, info.height), (3, 2));
    }
}
