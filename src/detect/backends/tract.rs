#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::classes::ClassSelection;
use crate::detect::annotate::annotate;
use crate::detect::backend::Detector;
use crate::detect::decode::{decode_head, DecodeParams};
use crate::detect::result::DetectionOutput;
use crate::frame::Frame;

/// Tract-based backend for YOLOv8-format ONNX detection models.
///
/// Loads a local model file and runs it on RGB frames resized to the model input.
/// Expects a single `[1, 4 + nc, anchors]` output.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
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

        log::info!(
            "tract detector loaded {} ({}x{})",
            model_path.display(),
            width,
            height
        );

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_rgb_image()?;
        let resized = imageops::resize(&image, self.width, self.height, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, allowed: &ClassSelection) -> Result<DetectionOutput> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let anchors = match shape.as_slice() {
            [1, _, anchors] => *anchors,
            other => return Err(anyhow!("unexpected detection head shape {:?}", other)),
        };
        let data: Vec<f32> = view.iter().copied().collect();

        let params = DecodeParams {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            scale_x: frame.width as f32 / self.width as f32,
            scale_y: frame.height as f32 / self.height as f32,
            frame_width: frame.width as f32,
            frame_height: frame.height as f32,
        };
        let detections = decode_head(&data, anchors, allowed, &params)?;
        let annotated = annotate(frame, &detections)?;
        Ok(DetectionOutput {
            detections,
            annotated,
        })
    }
}
