//! Optional frame capture.
//!
//! When recording is enabled, every processed frame is written as a JPEG
//! into a run directory. Config validation has already enforced the
//! preconditions (a video or camera source and an explicit resolution), so
//! the recorder itself only deals with the filesystem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::frame::Frame;

pub struct Recorder {
    dir: PathBuf,
    frames_written: u64,
}

impl Recorder {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create capture directory {}", dir.display()))?;
        log::info!("recording frames to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            frames_written: 0,
        })
    }

    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.jpg", frame.index));
        frame
            .pixels
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("cannot write {}", path.display()))?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
