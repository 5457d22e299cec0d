use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::{InferenceBackend, RawDetection};

/// Scripted backend: pops one prepared detection set per frame, then
/// returns empty sets once the script runs out. Used by tests and by
/// stub source runs with no model available.
pub struct ScriptedBackend {
    script: VecDeque<Vec<RawDetection>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Backend that never detects anything.
    pub fn quiet() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }
}

impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn infer(&mut self, _pixels: &RgbImage) -> Result<Vec<RawDetection>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_consumed_in_order_then_empty() {
        let hit = RawDetection {
            class_id: 0,
            confidence: 0.9,
            xmin: 0.0,
            ymin: 0.0,
            xmax: 10.0,
            ymax: 10.0,
        };
        let mut backend = ScriptedBackend::new(vec![vec![], vec![hit]]);
        let pixels = RgbImage::new(4, 4);

        assert!(backend.infer(&pixels).unwrap().is_empty());
        assert_eq!(backend.infer(&pixels).unwrap(), vec![hit]);
        assert!(backend.infer(&pixels).unwrap().is_empty());
    }
}
