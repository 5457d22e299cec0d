//! Frame sources.
//!
//! This module provides the sources the detection loop can pull frames
//! from:
//! - a single image file, yielded once
//! - a directory of images, sorted, each yielded once
//! - a local video file (feature: source-ffmpeg)
//! - a live USB camera via V4L2 (feature: source-v4l2)
//! - a stub source producing deterministic synthetic frames (testing)
//!
//! The source layer is responsible for:
//! - Resolving the configured source string into a concrete kind
//! - Applying the configured resolution before the first read
//! - Yielding decoded RGB frames with a run-scoped sequence index
//!
//! Finite sources signal exhaustion by returning `Ok(None)`; that is normal
//! loop termination, not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use url::Url;

use crate::frame::Frame;
use crate::Fault;

#[cfg(feature = "source-v4l2")]
mod camera;
mod still;
mod stub;
#[cfg(feature = "source-ffmpeg")]
mod video;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mov", "mkv"];

const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;

/// Capture resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Parse a "WIDTHxHEIGHT" string. Malformed input fails fast, before any
/// frame is requested.
pub fn parse_resolution(raw: &str) -> Result<Resolution> {
    let lowered = raw.trim().to_lowercase();
    let malformed = || {
        Fault::Configuration(format!(
            "invalid resolution '{}': expected WIDTHxHEIGHT, e.g. 640x480",
            raw
        ))
    };
    let (w, h) = lowered.split_once('x').ok_or_else(malformed)?;
    let width: u32 = w.trim().parse().map_err(|_| malformed())?;
    let height: u32 = h.trim().parse().map_err(|_| malformed())?;
    if width == 0 || height == 0 {
        return Err(malformed().into());
    }
    Ok(Resolution { width, height })
}

/// What a source string resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Single image file, yielded once.
    Image(PathBuf),
    /// Directory of images, sorted by path, each yielded once.
    Folder(PathBuf),
    /// Local video file, decoded sequentially until end of stream.
    Video(PathBuf),
    /// Live USB camera by V4L2 index ("usb0" selects /dev/video0).
    Camera(u32),
    /// Synthetic source for tests ("stub://name?frames=N").
    Stub { name: String, frames: Option<u64> },
}

impl SourceSpec {
    /// Resolve a raw source string. Extension lists and the "usbN" form
    /// follow the deployed camera tooling.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.starts_with("stub://") {
            return parse_stub_spec(raw);
        }

        let path = Path::new(raw);
        if path.is_dir() {
            return Ok(SourceSpec::Folder(path.to_path_buf()));
        }
        if path.is_file() {
            let ext = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_lowercase())
                .unwrap_or_default();
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                return Ok(SourceSpec::Image(path.to_path_buf()));
            }
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return Ok(SourceSpec::Video(path.to_path_buf()));
            }
            return Err(Fault::Configuration(format!(
                "unsupported file extension for source '{}'",
                raw
            ))
            .into());
        }
        if let Some(index) = raw.strip_prefix("usb") {
            let index: u32 = index.parse().map_err(|_| {
                Fault::Configuration(format!("invalid camera source '{}': expected usbN", raw))
            })?;
            return Ok(SourceSpec::Camera(index));
        }

        Err(Fault::Configuration(format!("unrecognized source '{}'", raw)).into())
    }

    /// Live sources never exhaust on their own.
    pub fn is_live(&self) -> bool {
        matches!(self, SourceSpec::Camera(_))
    }

    /// Recording is supported for motion sources only.
    pub fn supports_recording(&self) -> bool {
        matches!(self, SourceSpec::Video(_) | SourceSpec::Camera(_))
    }
}

fn parse_stub_spec(raw: &str) -> Result<SourceSpec> {
    let url = Url::parse(raw)
        .map_err(|e| Fault::Configuration(format!("invalid stub source '{}': {}", raw, e)))?;
    let name = url.host_str().unwrap_or("stub").to_string();
    let mut frames = None;
    for (key, value) in url.query_pairs() {
        if key == "frames" {
            let parsed: u64 = value.parse().map_err(|_| {
                Fault::Configuration(format!(
                    "invalid stub frame count '{}' in source '{}'",
                    value, raw
                ))
            })?;
            frames = Some(parsed);
        }
    }
    Ok(SourceSpec::Stub { name, frames })
}

/// A frame source bound to one concrete backend.
///
/// The source handle is owned exclusively by the detection controller for
/// the process lifetime; dropping it releases the underlying device or
/// decoder on every exit path.
#[derive(Debug)]
pub struct FrameSource {
    backend: SourceBackend,
    resolution: Option<Resolution>,
    frames_yielded: u64,
    description: String,
}

#[derive(Debug)]
enum SourceBackend {
    Still(still::StillSource),
    Stub(stub::StubSource),
    #[cfg(feature = "source-ffmpeg")]
    Video(video::VideoSource),
    #[cfg(feature = "source-v4l2")]
    Camera(camera::CameraSource),
}

impl FrameSource {
    /// Open the source described by `spec`. The resolution, when given, is
    /// applied before the first read: cameras negotiate it with the device,
    /// other sources resize after decode.
    pub fn open(spec: &SourceSpec, resolution: Option<Resolution>) -> Result<Self> {
        let description = describe(spec);
        let backend = match spec {
            SourceSpec::Image(path) => SourceBackend::Still(still::StillSource::single(path)?),
            SourceSpec::Folder(path) => SourceBackend::Still(still::StillSource::folder(path)?),
            SourceSpec::Stub { name, frames } => SourceBackend::Stub(stub::StubSource::new(
                name,
                *frames,
                resolution.unwrap_or(Resolution {
                    width: DEFAULT_STUB_WIDTH,
                    height: DEFAULT_STUB_HEIGHT,
                }),
            )),
            SourceSpec::Video(path) => {
                #[cfg(feature = "source-ffmpeg")]
                {
                    SourceBackend::Video(video::VideoSource::open(path)?)
                }
                #[cfg(not(feature = "source-ffmpeg"))]
                {
                    let _ = path;
                    return Err(Fault::Configuration(
                        "video sources require the source-ffmpeg feature".to_string(),
                    )
                    .into());
                }
            }
            SourceSpec::Camera(index) => {
                #[cfg(feature = "source-v4l2")]
                {
                    SourceBackend::Camera(camera::CameraSource::open(*index, resolution)?)
                }
                #[cfg(not(feature = "source-v4l2"))]
                {
                    let _ = index;
                    return Err(Fault::Configuration(
                        "camera sources require the source-v4l2 feature".to_string(),
                    )
                    .into());
                }
            }
        };

        log::info!("frame source opened: {}", description);
        Ok(Self {
            backend,
            resolution,
            frames_yielded: 0,
            description,
        })
    }

    /// Pull the next frame. `Ok(None)` means the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let pixels = match &mut self.backend {
            SourceBackend::Still(source) => source.next_pixels()?,
            SourceBackend::Stub(source) => source.next_pixels(),
            #[cfg(feature = "source-ffmpeg")]
            SourceBackend::Video(source) => source.next_pixels()?,
            #[cfg(feature = "source-v4l2")]
            SourceBackend::Camera(source) => Some(source.next_pixels()?),
        };
        let Some(pixels) = pixels else {
            return Ok(None);
        };

        let pixels = self.resize_if_needed(pixels);
        self.frames_yielded += 1;
        Ok(Some(Frame::new(pixels, self.frames_yielded)))
    }

    fn resize_if_needed(&self, pixels: RgbImage) -> RgbImage {
        let Some(res) = self.resolution else {
            return pixels;
        };
        if pixels.dimensions() == (res.width, res.height) {
            return pixels;
        }
        image::imageops::resize(&pixels, res.width, res.height, FilterType::Triangle)
    }

    pub fn frames_yielded(&self) -> u64 {
        self.frames_yielded
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

fn describe(spec: &SourceSpec) -> String {
    match spec {
        SourceSpec::Image(path) => format!("image {}", path.display()),
        SourceSpec::Folder(path) => format!("folder {}", path.display()),
        SourceSpec::Video(path) => format!("video {}", path.display()),
        SourceSpec::Camera(index) => format!("camera /dev/video{}", index),
        SourceSpec::Stub { name, frames } => match frames {
            Some(n) => format!("stub {} ({} frames)", name, n),
            None => format!("stub {}", name),
        },
    }
}

/// Decode one image file into RGB pixels. Shared by the still backends.
pub(crate) fn load_rgb(path: &Path) -> Result<RgbImage> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(decoded.to_rgb8())
}
