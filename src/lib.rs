//! License plate recognition over video.
//!
//! Vehicles are tracked across frames with SORT (Kalman filter plus IoU
//! assignment), plates are attached to the vehicle that encloses them, read
//! with OCR and reduced to the single best read per vehicle.
//!
//! # Example
//!
//! ```no_run
//! use platetrack_rs::{Detection, SortTracker, TrackerConfig};
//!
//! let mut tracker = SortTracker::new(TrackerConfig::default());
//! let tracks = tracker.update(&[Detection::new(100.0, 100.0, 300.0, 250.0, 0.9)]);
//! for t in &tracks {
//!     println!("vehicle {} at {:?}", t.track_id, t.bbox.to_tlbr());
//! }
//! ```

pub mod config;
pub mod error;
pub mod integration;
pub mod plate;
pub mod tracker;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use integration::{OcrEngine, PlateDetector, PlatePipeline, VehicleDetector};
pub use plate::{BestDetectionAggregator, BestRecord, read_license_plate, write_csv};
pub use tracker::{Detection, Rect, SortTracker, TrackedBox, TrackerConfig};
