//! Integration module connecting detection, OCR and frame I/O backends with
//! the tracker and the plate aggregation.
//!
//! The pipeline is generic over the `VehicleDetector`, `PlateDetector` and
//! `OcrEngine` traits. Concrete backends live behind cargo features where
//! they pull in native libraries.

mod annotate;
mod builder;
mod detector;
mod frames;
mod pipeline;
mod replay;
mod roboflow;

pub use annotate::{Annotator, PLATE_COLOR, VEHICLE_COLOR};
pub use builder::DetectionBuilder;
pub use detector::{OcrEngine, PlateDetector, PlatePrediction, VehicleDetector};
pub use frames::{DiscardFrames, FrameSink, FrameSource, ImageSequence, ImageSequenceWriter};
pub use pipeline::{FrameReport, PlateOutcome, PlatePipeline};
pub use replay::ReplayDetector;
pub use roboflow::RoboflowPlateDetector;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};

#[cfg(feature = "tesseract")]
mod tesseract;

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractOcr;
