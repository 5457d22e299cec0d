//! Detection: inference backends, label mapping, confidence filtering.
//!
//! The detector invokes the configured backend once per frame, drops raw
//! detections below the confidence threshold, maps class indices to labels
//! through a fixed table loaded at startup, and clips boxes to the frame
//! bounds. There is no caching and no batching across frames; given the
//! same backend, frame and threshold the result is deterministic.

pub mod backend;
pub mod backends;
mod labels;

use anyhow::Result;

pub use backend::{InferenceBackend, RawDetection};
pub use labels::LabelTable;

use crate::frame::{BoundingBox, Frame};

/// One labeled detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    /// Invariant: at or above the threshold the detector was called with.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// All detections for one frame, in backend order. May be empty.
pub type DetectionSet = Vec<Detection>;

/// Detector bound to one backend and one label table.
pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    labels: LabelTable,
}

impl Detector {
    pub fn new(backend: Box<dyn InferenceBackend>, labels: LabelTable) -> Self {
        Self { backend, labels }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Run the backend on one frame and return the filtered, labeled set.
    ///
    /// An unknown class index means the label table and the model disagree;
    /// that is a configuration fault, never a silently skipped detection.
    pub fn detect(&mut self, frame: &Frame, min_confidence: f32) -> Result<DetectionSet> {
        let raw = self.backend.infer(&frame.pixels)?;

        let mut detections = Vec::new();
        for r in raw {
            if r.confidence < min_confidence {
                continue;
            }
            let label = self.labels.label_for(r.class_id)?.to_string();
            detections.push(Detection {
                class_id: r.class_id,
                label,
                confidence: r.confidence,
                bbox: BoundingBox::clipped(
                    r.xmin,
                    r.ymin,
                    r.xmax,
                    r.ymax,
                    frame.width(),
                    frame.height(),
                ),
            });
        }
        Ok(detections)
    }
}
