//! Still image sources: a single file or a sorted folder of images.

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbImage;

use super::{load_rgb, IMAGE_EXTENSIONS};
use crate::Fault;

/// Finite source backed by a fixed list of image paths. Each path is
/// decoded once, in order; the source is exhausted afterwards.
#[derive(Debug)]
pub(crate) struct StillSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl StillSource {
    pub(crate) fn single(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Fault::SourceUnavailable(format!(
                "image {} does not exist",
                path.display()
            ))
            .into());
        }
        Ok(Self {
            paths: vec![path.to_path_buf()],
            cursor: 0,
        })
    }

    pub(crate) fn folder(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Fault::SourceUnavailable(format!("cannot read folder {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_image_path(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            log::warn!("folder {} contains no images", dir.display());
        }
        Ok(Self { paths, cursor: 0 })
    }

    pub(crate) fn next_pixels(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let pixels = load_rgb(path)?;
        Ok(Some(pixels))
    }
}

fn is_image_path(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
