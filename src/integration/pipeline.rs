//! PlatePipeline: detection, tracking, plate reading and aggregation per frame.

use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use tracing::{debug, info, warn};

use super::annotate::Annotator;
use super::frames::{FrameSink, FrameSource};
use super::{OcrEngine, PlateDetector, VehicleDetector};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::plate::{
    BestDetectionAggregator, BestRecord, PlateObservation, PlateReading, find_vehicle,
    read_license_plate,
};
use crate::tracker::{Detection, Rect, SortTracker, TrackedBox};

/// A plate seen in one frame and what became of it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateOutcome {
    pub bbox: Rect,
    pub confidence: f32,
    /// Track id of the enclosing vehicle, if any.
    pub car_id: Option<u64>,
    pub reading: Option<PlateReading>,
}

/// Everything produced for a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame_nmr: u64,
    pub vehicles: Vec<TrackedBox>,
    pub plates: Vec<PlateOutcome>,
}

/// End-to-end plate recognition over a frame stream.
///
/// Detector and OCR failures are logged and degrade to "nothing found" for
/// the frame; they never abort a run.
pub struct PlatePipeline<V, P, O> {
    vehicle_detector: V,
    plate_detector: P,
    ocr: O,
    tracker: SortTracker,
    aggregator: BestDetectionAggregator,
    annotator: Annotator,
    vehicle_classes: Vec<u32>,
    binarize_threshold: Option<u8>,
}

impl<V, P, O> PlatePipeline<V, P, O>
where
    V: VehicleDetector,
    P: PlateDetector,
    O: OcrEngine,
{
    pub fn new(vehicle_detector: V, plate_detector: P, ocr: O, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vehicle_detector,
            plate_detector,
            ocr,
            tracker: SortTracker::new(config.tracker.clone()),
            aggregator: BestDetectionAggregator::new(),
            annotator: Annotator::from_config(&config.annotation)?,
            vehicle_classes: config.vehicle_classes.clone(),
            binarize_threshold: config.ocr.binarize_threshold,
        })
    }

    /// Replace the annotator built from config.
    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn tracker(&self) -> &SortTracker {
        &self.tracker
    }

    pub fn aggregator(&self) -> &BestDetectionAggregator {
        &self.aggregator
    }

    /// Process one frame in place: the frame comes back annotated.
    pub fn process_frame(&mut self, frame_nmr: u64, frame: &mut RgbImage) -> FrameReport {
        self.aggregator.record_frame();

        let detections = match self.vehicle_detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                warn!(frame = frame_nmr, error = %e, "vehicle detection failed");
                Vec::new()
            }
        };
        let vehicles: Vec<Detection> = detections
            .into_iter()
            .filter(|d| self.is_vehicle(d))
            .collect();
        let tracked = self.tracker.update(&vehicles);

        let predictions = match self.plate_detector.detect_plates(frame) {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!(frame = frame_nmr, error = %e, "plate detection failed");
                Vec::new()
            }
        };

        // Read every plate before anything is drawn on the frame.
        let mut plates = Vec::with_capacity(predictions.len());
        for prediction in &predictions {
            let bbox = prediction.to_rect();
            let car_id = find_vehicle(&bbox, &tracked).map(|v| v.track_id);
            let reading = match car_id {
                Some(_) => self.read_plate(frame_nmr, frame, &bbox),
                None => None,
            };
            plates.push(PlateOutcome {
                bbox,
                confidence: prediction.confidence,
                car_id,
                reading,
            });
        }

        self.annotate(frame, &tracked, &plates);

        for plate in &plates {
            let (Some(car_id), Some(reading)) = (plate.car_id, &plate.reading) else {
                continue;
            };
            let Some(vehicle) = tracked.iter().find(|v| v.track_id == car_id) else {
                continue;
            };
            let improved = self.aggregator.observe(
                frame_nmr,
                car_id,
                vehicle.bbox,
                PlateObservation {
                    bbox: plate.bbox,
                    bbox_score: plate.confidence,
                    text: reading.text.clone(),
                    text_score: reading.confidence,
                },
            );
            if improved {
                debug!(frame = frame_nmr, car_id, license = %reading.text, "new best plate read");
            }
        }

        FrameReport {
            frame_nmr,
            vehicles: tracked,
            plates,
        }
    }

    /// Drain `source`, writing every annotated frame to `sink`, and return
    /// the best record per vehicle.
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<Vec<BestRecord>>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let mut frame_nmr = 0u64;
        while let Some(mut frame) = source.next_frame()? {
            let report = self.process_frame(frame_nmr, &mut frame);
            debug!(
                frame = frame_nmr,
                vehicles = report.vehicles.len(),
                plates = report.plates.len(),
                "frame processed"
            );
            sink.write_frame(frame_nmr, &frame)?;
            frame_nmr += 1;
        }
        info!(frames = frame_nmr, "stream finished");
        Ok(self.finalize())
    }

    pub fn finalize(self) -> Vec<BestRecord> {
        self.aggregator.finalize()
    }

    /// Detections without a class id are assumed to be pre-filtered.
    fn is_vehicle(&self, detection: &Detection) -> bool {
        detection
            .class_id
            .is_none_or(|class_id| self.vehicle_classes.contains(&class_id))
    }

    fn read_plate(&mut self, frame_nmr: u64, frame: &RgbImage, bbox: &Rect) -> Option<PlateReading> {
        let crop = plate_crop(frame, bbox, self.binarize_threshold)?;
        match self.ocr.read_text(&crop) {
            Ok(candidates) => read_license_plate(&candidates),
            Err(e) => {
                warn!(frame = frame_nmr, error = %e, "ocr failed");
                None
            }
        }
    }

    fn annotate(&self, frame: &mut RgbImage, tracked: &[TrackedBox], plates: &[PlateOutcome]) {
        for vehicle in tracked {
            self.annotator.draw_vehicle(frame, &vehicle.bbox, vehicle.track_id);
        }
        for plate in plates {
            self.annotator.draw_plate(frame, &plate.bbox, plate.confidence);
            let (Some(car_id), Some(reading)) = (plate.car_id, &plate.reading) else {
                continue;
            };
            if let Some(vehicle) = tracked.iter().find(|v| v.track_id == car_id) {
                self.annotator.draw_plate_text(frame, &vehicle.bbox, &reading.text);
            }
        }
    }
}

/// Grayscale crop of the plate region clamped to the frame, optionally
/// inverse-binarized. `None` if nothing of the plate lies inside the frame.
fn plate_crop(frame: &RgbImage, bbox: &Rect, binarize_threshold: Option<u8>) -> Option<GrayImage> {
    if !bbox.is_finite() {
        return None;
    }
    let [x1, y1, x2, y2] = bbox.to_tlbr();
    let (width, height) = frame.dimensions();
    let left = x1.max(0.0) as u32;
    let top = y1.max(0.0) as u32;
    let right = (x2.max(0.0) as u32).min(width);
    let bottom = (y2.max(0.0) as u32).min(height);
    if right <= left || bottom <= top {
        return None;
    }

    let region = imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image();
    let mut gray = imageops::grayscale(&region);
    if let Some(threshold) = binarize_threshold {
        for pixel in gray.pixels_mut() {
            *pixel = if pixel[0] > threshold { Luma([0]) } else { Luma([255]) };
        }
    }
    Some(gray)
}
