//! Synthetic frame source for tests (stub:// sources).

use image::RgbImage;

use super::Resolution;

/// Deterministic synthetic frames. Pixel content varies with the frame
/// counter so consecutive frames differ; an optional limit makes the source
/// finite for end-of-stream tests.
#[derive(Debug)]
pub(crate) struct StubSource {
    name: String,
    resolution: Resolution,
    frame_limit: Option<u64>,
    frame_count: u64,
}

impl StubSource {
    pub(crate) fn new(name: &str, frame_limit: Option<u64>, resolution: Resolution) -> Self {
        Self {
            name: name.to_string(),
            resolution,
            frame_limit,
            frame_count: 0,
        }
    }

    pub(crate) fn next_pixels(&mut self) -> Option<RgbImage> {
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                log::debug!("stub source {} exhausted after {} frames", self.name, limit);
                return None;
            }
        }
        self.frame_count += 1;
        Some(self.generate_pixels())
    }

    fn generate_pixels(&self) -> RgbImage {
        let Resolution { width, height } = self.resolution;
        let count = self.frame_count;
        RgbImage::from_fn(width, height, |x, y| {
            let v = (x as u64 + y as u64 + count) % 256;
            image::Rgb([v as u8, (v / 2) as u8, (255 - v) as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Resolution {
        Resolution {
            width: 16,
            height: 12,
        }
    }

    #[test]
    fn unlimited_stub_keeps_producing() {
        let mut source = StubSource::new("cabin", None, small());
        for _ in 0..10 {
            assert!(source.next_pixels().is_some());
        }
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = StubSource::new("cabin", None, small());
        let a = source.next_pixels().unwrap();
        let b = source.next_pixels().unwrap();
        assert_ne!(a.as_raw(), b.as_raw());
    }
}
