use anyhow::Result;
use image::RgbImage;

/// Raw model output for one object, before thresholding and label mapping.
/// Box coordinates are in pixel space and may extend past the frame; the
/// detector clips them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// Inference backend trait.
///
/// One blocking call per frame, no timeout. A stalled backend stalls the
/// whole loop; the process is sized for one dedicated camera, so this is an
/// accepted property rather than a defect.
///
/// Implementations must be deterministic for identical model and frame
/// input, and must not cache results or batch across frames.
pub trait InferenceBackend: Send {
    /// Backend identifier used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Run inference on one RGB frame.
    fn infer(&mut self, pixels: &RgbImage) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, called once before the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
