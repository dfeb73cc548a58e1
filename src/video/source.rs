use std::path::{Path, PathBuf};

use crate::{
    foundation::{
        core::{Rgba8, Size2},
        error::{ShadowError, ShadowResult},
    },
    gpu::image::{PixelFormat, solid_bytes},
    video::frame::{TrackId, VideoFrame},
};

/// A decodable video asset.
pub trait VideoSource: Send + Sync {
    /// Asset name used in logs.
    fn name(&self) -> &str;

    /// Pixel size of decoded frames.
    fn natural_size(&self) -> ShadowResult<Size2>;

    /// Nominal frames per second.
    fn fps(&self) -> f64;

    /// Number of frames; playback finishes after the last one.
    fn frame_count(&self) -> u64;

    /// Source tracks every composition request of this asset exposes.
    fn required_source_tracks(&self) -> Vec<TrackId> {
        vec![TrackId(1)]
    }

    /// Decode frame `index` as tightly packed BGRA.
    fn decode_frame(&self, index: u64) -> ShadowResult<VideoFrame>;
}

/// Procedural pattern of a [`SyntheticVideo`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SyntheticPattern {
    /// Every pixel the same color.
    Solid(Rgba8),
    /// Horizontal gray ramp that scrolls one pixel per frame and wraps at the right edge.
    Gradient,
}

/// In-memory video used by tests, the CLI and hosts without a decoder.
#[derive(Clone, Debug)]
pub struct SyntheticVideo {
    name: String,
    size: Size2,
    fps: f64,
    frames: u64,
    pattern: SyntheticPattern,
    tracks: u32,
}

impl SyntheticVideo {
    /// Gradient video of `frames` frames.
    pub fn new(name: impl Into<String>, size: Size2, fps: f64, frames: u64) -> Self {
        Self {
            name: name.into(),
            size,
            fps,
            frames,
            pattern: SyntheticPattern::Gradient,
            tracks: 1,
        }
    }

    /// Replace the pattern.
    pub fn with_pattern(mut self, pattern: SyntheticPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Number of source tracks each request exposes.
    pub fn with_tracks(mut self, tracks: u32) -> Self {
        self.tracks = tracks;
        self
    }
}

impl VideoSource for SyntheticVideo {
    fn name(&self) -> &str {
        &self.name
    }

    fn natural_size(&self) -> ShadowResult<Size2> {
        Ok(self.size)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn required_source_tracks(&self) -> Vec<TrackId> {
        (1..=self.tracks).map(TrackId).collect()
    }

    fn decode_frame(&self, index: u64) -> ShadowResult<VideoFrame> {
        if index >= self.frames {
            return Err(ShadowError::validation(format!(
                "'{}' has {} frames, requested {index}",
                self.name, self.frames
            )));
        }
        let (w, h) = (self.size.width, self.size.height);
        let data = match self.pattern {
            SyntheticPattern::Solid(c) => {
                solid_bytes(PixelFormat::Bgra8Unorm, w, h, [c.r, c.g, c.b, c.a])
            }
            SyntheticPattern::Gradient => {
                let width = u64::from(w);
                let span = width.max(2) - 1;
                let row: Vec<u8> = (0..width)
                    .flat_map(|x| {
                        let pos = (x + index % width) % width;
                        let v = u8::try_from(pos * 255 / span).unwrap_or(u8::MAX);
                        [v, v, v, 255]
                    })
                    .collect();
                row.repeat(h as usize)
            }
        };
        VideoFrame::new(index, self.size, PixelFormat::Bgra8Unorm, data)
    }
}

/// Probed stream facts of a video file.
#[derive(Clone, Debug)]
pub struct VideoFileInfo {
    /// File on disk.
    pub source_path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate numerator.
    pub fps_num: u32,
    /// Frame rate denominator.
    pub fps_den: u32,
    /// Container duration in seconds, 0 if unknown.
    pub duration_sec: f64,
}

impl VideoFileInfo {
    /// Frame rate as a float, 0 if unknown.
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    /// Whole frames covered by the duration.
    pub fn frame_count(&self) -> u64 {
        (self.duration_sec * self.fps()).floor().max(0.0) as u64
    }
}

/// Video file decoded through the `ffprobe`/`ffmpeg` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegVideoSource {
    name: String,
    info: VideoFileInfo,
}

impl FfmpegVideoSource {
    /// Probe `path` and keep its stream info.
    pub fn open(path: &Path) -> ShadowResult<Self> {
        let info = probe_video(path)?;
        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps(),
            "opened video"
        );
        Ok(Self {
            name: path.display().to_string(),
            info,
        })
    }

    /// Probed stream info.
    pub fn info(&self) -> &VideoFileInfo {
        &self.info
    }
}

impl VideoSource for FfmpegVideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn natural_size(&self) -> ShadowResult<Size2> {
        Size2::new(self.info.width, self.info.height)
            .map_err(|e| ShadowError::setup(format!("'{}': {e}", self.name)))
    }

    fn fps(&self) -> f64 {
        self.info.fps()
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count()
    }

    fn decode_frame(&self, index: u64) -> ShadowResult<VideoFrame> {
        let fps = self.info.fps();
        let t = if fps > 0.0 { index as f64 / fps } else { 0.0 };
        let data = decode_frame_bgra8(&self.info, t)?;
        VideoFrame::new(index, self.natural_size()?, PixelFormat::Bgra8Unorm, data)
    }
}

#[cfg(feature = "media-ffmpeg")]
fn probe_video(source_path: &Path) -> ShadowResult<VideoFileInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }

    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }

    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| ShadowError::setup(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ShadowError::setup(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ShadowError::setup(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ShadowError::setup("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| ShadowError::setup("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| ShadowError::setup("missing video height from ffprobe"))?;
    let (fps_num, fps_den) = parse_ff_ratio(video.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| ShadowError::setup("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoFileInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
fn probe_video(_source_path: &Path) -> ShadowResult<VideoFileInfo> {
    Err(ShadowError::setup(
        "video files require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
fn decode_frame_bgra8(info: &VideoFileInfo, time_sec: f64) -> ShadowResult<Vec<u8>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{time_sec:.9}")])
        .arg("-i")
        .arg(&info.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgra",
            "pipe:1",
        ])
        .output()
        .map_err(|e| ShadowError::render(format!("failed to run ffmpeg for video decode: {e}")))?;
    if !out.status.success() {
        return Err(ShadowError::render(format!(
            "ffmpeg video decode failed for '{}': {}",
            info.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = info.width as usize * info.height as usize * 4;
    if expected_len == 0 || out.stdout.len() < expected_len {
        return Err(ShadowError::render(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }
    let mut frame = out.stdout;
    frame.truncate(expected_len);
    Ok(frame)
}

#[cfg(not(feature = "media-ffmpeg"))]
fn decode_frame_bgra8(_info: &VideoFileInfo, _time_sec: f64) -> ShadowResult<Vec<u8>> {
    Err(ShadowError::render(
        "video files require the 'media-ffmpeg' feature",
    ))
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/video/source.rs"]
mod tests;
