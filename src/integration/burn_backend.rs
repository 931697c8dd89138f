//! Burn inference backend for vehicle detection.
//!
//! This module provides a `BurnDetector` that implements `VehicleDetector`
//! for running object detection models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use platetrack_rs::integration::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("yolo.bin"), Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use image::RgbImage;
use image::imageops::{self, FilterType};
use thiserror::Error;

use super::{DetectionBuilder, VehicleDetector};
use crate::tracker::Detection;

#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("Model expects {expected} channels, only 3 (RGB) are supported")]
    UnsupportedChannels { expected: u32 },

    #[error("Empty input frame")]
    EmptyFrame,
}

/// Raw detection output from the model, in model input coordinates.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    pub score: f32,
    /// COCO class id for multi-class models
    pub class_id: Option<u32>,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[batch, channels, height, width]` tensor.
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    /// Resize the frame to the model input and lay it out as normalized CHW.
    pub fn preprocess(&self, frame: &RgbImage) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        if channels != 3 {
            return Err(BurnDetectorError::UnsupportedChannels { expected: channels });
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BurnDetectorError::EmptyFrame);
        }

        let resized = imageops::resize(frame, target_w, target_h, FilterType::Triangle);
        Ok(Tensor::<B, 1>::from_floats(to_chw(&resized).as_slice(), &self.device).reshape([
            1,
            channels as usize,
            target_h as usize,
            target_w as usize,
        ]))
    }

    /// Filter by confidence and map boxes back to frame coordinates.
    fn postprocess(&self, raw: Vec<RawDetection>, frame_w: u32, frame_h: u32) -> Vec<Detection> {
        let (_, target_h, target_w) = self.model.input_size();
        let sx = frame_w as f32 / target_w as f32;
        let sy = frame_h as f32 / target_h as f32;

        raw.into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .map(|d| {
                let [a, b, c, e] = d.bbox;
                let mut builder = DetectionBuilder::new().score(d.score);
                if let Some(class_id) = d.class_id {
                    builder = builder.class_id(class_id);
                }
                if self.model.bbox_is_xywh() {
                    builder.xywh(a * sx, b * sy, c * sx, e * sy).build()
                } else {
                    builder.tlbr(a * sx, b * sy, c * sx, e * sy).build()
                }
            })
            .collect()
    }
}

/// HWC u8 pixels to CHW floats in [0, 1].
fn to_chw(image: &RgbImage) -> Vec<f32> {
    let plane = (image.width() * image.height()) as usize;
    let mut data = vec![0.0f32; plane * 3];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

impl<B: Backend, M: BurnModel<B>> VehicleDetector for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw = self.model.forward(tensor);
        Ok(self.postprocess(raw, frame.width(), frame.height()))
    }
}
