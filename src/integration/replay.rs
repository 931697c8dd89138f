//! Replay of pre-computed detections from a JSON-lines file.
//!
//! Each line holds one frame:
//! `{"frame": 0, "detections": [{"bbox": [x1, y1, x2, y2], "score": 0.9, "class_id": 2}]}`.
//! Frames without a line have no detections. Every `detect` call consumes one frame.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image::RgbImage;
use serde::Deserialize;
use tracing::info;

use super::{DetectionBuilder, PlateDetector, PlatePrediction, VehicleDetector};
use crate::error::{Error, Result};
use crate::tracker::Detection;

#[derive(Debug, Deserialize)]
struct ReplayFrame {
    frame: u64,
    detections: Vec<ReplayBox>,
}

#[derive(Debug, Deserialize)]
struct ReplayBox {
    bbox: [f32; 4],
    score: f32,
    #[serde(default)]
    class_id: Option<u32>,
}

impl ReplayBox {
    fn into_detection(self) -> Detection {
        let [x1, y1, x2, y2] = self.bbox;
        let builder = DetectionBuilder::new().tlbr(x1, y1, x2, y2).score(self.score);
        match self.class_id {
            Some(class_id) => builder.class_id(class_id).build(),
            None => builder.build(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<Detection>>,
    cursor: u64,
}

impl ReplayDetector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let detector = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            path = %path.display(),
            frames = detector.frames.len(),
            "loaded detection replay"
        );
        Ok(detector)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut frames: HashMap<u64, Vec<Detection>> = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ReplayFrame = serde_json::from_str(&line)?;
            frames
                .entry(parsed.frame)
                .or_default()
                .extend(parsed.detections.into_iter().map(ReplayBox::into_detection));
        }
        Ok(Self { frames, cursor: 0 })
    }

    /// Detections for the next frame.
    fn next_frame(&mut self) -> Vec<Detection> {
        let detections = self.frames.remove(&self.cursor).unwrap_or_default();
        self.cursor += 1;
        detections
    }
}

impl VehicleDetector for ReplayDetector {
    type Error = Error;

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.next_frame())
    }
}

impl PlateDetector for ReplayDetector {
    type Error = Error;

    fn detect_plates(&mut self, _frame: &RgbImage) -> Result<Vec<PlatePrediction>> {
        Ok(self.next_frame().iter().map(PlatePrediction::from).collect())
    }
}
