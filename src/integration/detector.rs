//! Traits for the external collaborators: vehicle detection, plate detection and OCR.

use std::fmt::Display;

use image::{GrayImage, RgbImage};
use serde::Deserialize;

use crate::plate::OcrCandidate;
use crate::tracker::{Detection, Rect};

/// Trait for vehicle detection backends.
///
/// Implement this trait to connect any detection model to the pipeline.
/// Class filtering happens in the pipeline, so return every class the
/// model reports.
///
/// # Example
///
/// ```ignore
/// use platetrack_rs::{Detection, VehicleDetector};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl VehicleDetector for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &image::RgbImage) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait VehicleDetector {
    /// Error type for detection failures.
    type Error: Display;

    /// Run inference on one frame.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

/// Trait for license plate detection backends.
pub trait PlateDetector {
    type Error: Display;

    /// Locate plates in one frame.
    fn detect_plates(&mut self, frame: &RgbImage) -> Result<Vec<PlatePrediction>, Self::Error>;
}

/// Trait for OCR engines.
pub trait OcrEngine {
    type Error: Display;

    /// Read text candidates from a grayscale or binarized plate crop, in the
    /// engine's order of preference.
    fn read_text(&mut self, crop: &GrayImage) -> Result<Vec<OcrCandidate>, Self::Error>;
}

/// Plate detector output in center form.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlatePrediction {
    /// Center x
    pub x: f32,
    /// Center y
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl PlatePrediction {
    pub fn to_rect(&self) -> Rect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

impl From<&Detection> for PlatePrediction {
    fn from(det: &Detection) -> Self {
        let (x, y) = det.bbox.center();
        Self {
            x,
            y,
            width: det.bbox.width,
            height: det.bbox.height,
            confidence: det.score,
        }
    }
}
