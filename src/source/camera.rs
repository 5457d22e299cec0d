//! Live USB camera source using V4L2.
//!
//! The device is opened at construction, the requested resolution is
//! negotiated before the first read, and frames are captured through a
//! memory-mapped buffer stream. A camera source never reports end of
//! stream; it runs until the controller stops pulling.

use anyhow::{Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

use super::Resolution;
use crate::Fault;

pub(crate) struct CameraSource {
    device_path: String,
    state: CameraState,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct CameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl CameraSource {
    pub(crate) fn open(index: u32, resolution: Option<Resolution>) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device_path = format!("/dev/video{}", index);
        let device = v4l::Device::with_path(&device_path).map_err(|e| {
            Fault::SourceUnavailable(format!("cannot open camera {}: {}", device_path, e))
        })?;

        let mut format = device.format().context("read v4l2 format")?;
        if let Some(res) = resolution {
            format.width = res.width;
            format.height = res.height;
        }
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {}: {}", device_path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let active_width = format.width;
        let active_height = format.height;

        let state = CameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|e| Fault::SourceUnavailable(format!("camera {}: {}", device_path, e)))?;

        log::info!(
            "camera {} streaming at {}x{}",
            device_path,
            active_width,
            active_height
        );
        Ok(Self {
            device_path,
            state,
            active_width,
            active_height,
        })
    }

    pub(crate) fn next_pixels(&mut self) -> Result<RgbImage> {
        use v4l::io::traits::CaptureStream;

        let device_path = self.device_path.clone();
        let (width, height) = (self.active_width, self.active_height);
        let pixels = self.state.with_mut(|fields| {
            let (buf, _meta) = fields
                .stream
                .next()
                .with_context(|| format!("capture frame from {}", device_path))?;
            Ok::<Vec<u8>, anyhow::Error>(buf.to_vec())
        })?;

        RgbImage::from_raw(width, height, pixels)
            .context("camera buffer size does not match the negotiated format")
    }
}
