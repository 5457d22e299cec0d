#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, RawDetection};
use crate::Fault;

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file once at startup and runs it on RGB frames.
/// The model is expected to take a 1x3xHxW float input in [0,1] and emit
/// one output of shape [N,6] rows `[xmin, ymin, xmax, ymax, confidence,
/// class]`, the layout produced by detection models exported with NMS
/// folded in. No network I/O, no disk writes beyond model loading.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk. A missing or unloadable model is a
    /// configuration fault raised before the loop starts.
    pub fn load(model_path: &Path, width: u32, height: u32) -> Result<Self> {
        if !model_path.is_file() {
            return Err(Fault::Configuration(format!(
                "model file {} does not exist",
                model_path.display()
            ))
            .into());
        }

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                Fault::Configuration(format!(
                    "failed to load ONNX model {}: {}",
                    model_path.display(),
                    e
                ))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, pixels: &RgbImage) -> Result<Tensor> {
        let (width, height) = pixels.dimensions();
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| pixels.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode_output(outputs: TVec<TValue>) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let flat: Vec<f32> = view.iter().cloned().collect();
        if flat.len() % 6 != 0 {
            return Err(anyhow!(
                "model output length {} is not a multiple of 6",
                flat.len()
            ));
        }

        let mut detections = Vec::with_capacity(flat.len() / 6);
        for row in flat.chunks_exact(6) {
            let class = row[5];
            if !class.is_finite() || class < 0.0 {
                return Err(anyhow!("model produced invalid class value {}", class));
            }
            detections.push(RawDetection {
                class_id: class as usize,
                confidence: row[4].clamp(0.0, 1.0),
                xmin: row[0],
                ymin: row[1],
                xmax: row[2],
                ymax: row[3],
            });
        }
        Ok(detections)
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, pixels: &RgbImage) -> Result<Vec<RawDetection>> {
        let input = self.build_input(pixels)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Self::decode_output(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.width, self.height);
        self.infer(&blank).map(|_| ())
    }
}
