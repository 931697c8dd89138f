//! Reduce per-frame plate reads to one best record per tracked vehicle.

use std::collections::BTreeMap;

use tracing::info;

use crate::tracker::Rect;

/// One frame's plate read attached to a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateObservation {
    pub bbox: Rect,
    /// Plate detector confidence
    pub bbox_score: f32,
    pub text: String,
    /// OCR confidence
    pub text_score: f32,
}

impl PlateObservation {
    /// Mean of the detector and OCR confidences.
    pub fn combined_score(&self) -> f32 {
        (self.bbox_score + self.text_score) / 2.0
    }
}

/// Best plate read seen for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct BestRecord {
    pub frame_nmr: u64,
    pub car_id: u64,
    pub car_bbox: Rect,
    pub plate: PlateObservation,
    pub combined_score: f32,
}

/// Keeps the highest scoring plate read per vehicle id for one run.
///
/// A stored record is replaced only by a strictly higher combined score, so
/// ties keep the earliest read.
#[derive(Debug, Default)]
pub struct BestDetectionAggregator {
    best: BTreeMap<u64, BestRecord>,
    frames_analyzed: u64,
    total_detections: u64,
}

impl BestDetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a processed frame, whether or not it produced any plate reads.
    pub fn record_frame(&mut self) {
        self.frames_analyzed += 1;
    }

    /// Offer a plate read for a vehicle. Returns true if it became the best record.
    pub fn observe(
        &mut self,
        frame_nmr: u64,
        car_id: u64,
        car_bbox: Rect,
        plate: PlateObservation,
    ) -> bool {
        self.total_detections += 1;
        let combined_score = plate.combined_score();

        let improves = self
            .best
            .get(&car_id)
            .is_none_or(|current| combined_score > current.combined_score);
        if improves {
            self.best.insert(
                car_id,
                BestRecord {
                    frame_nmr,
                    car_id,
                    car_bbox,
                    plate,
                    combined_score,
                },
            );
        }
        improves
    }

    /// Current best record for a vehicle.
    pub fn best(&self, car_id: u64) -> Option<&BestRecord> {
        self.best.get(&car_id)
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn unique_vehicles(&self) -> usize {
        self.best.len()
    }

    /// Close the run and return the best records ordered by vehicle id.
    pub fn finalize(self) -> Vec<BestRecord> {
        info!(
            frames = self.frames_analyzed,
            detections = self.total_detections,
            vehicles = self.best.len(),
            "analysis summary"
        );
        for record in self.best.values() {
            info!(
                car_id = record.car_id,
                frame = record.frame_nmr,
                license = %record.plate.text,
                bbox_score = format_args!("{:.3}", record.plate.bbox_score),
                text_score = format_args!("{:.3}", record.plate.text_score),
                combined = format_args!("{:.3}", record.combined_score),
                "best detection"
            );
        }
        self.best.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(text: &str, bbox_score: f32, text_score: f32) -> PlateObservation {
        PlateObservation {
            bbox: Rect::from_tlbr(10.0, 10.0, 60.0, 25.0),
            bbox_score,
            text: text.to_string(),
            text_score,
        }
    }

    fn car() -> Rect {
        Rect::from_tlbr(0.0, 0.0, 100.0, 100.0)
    }

    #[test]
    fn test_keeps_highest_combined_score() {
        let mut agg = BestDetectionAggregator::new();
        agg.observe(0, 5, car(), observation("AAA", 0.4, 0.4));
        agg.observe(1, 5, car(), observation("BBB", 0.9, 0.9));
        agg.observe(2, 5, car(), observation("CCC", 0.7, 0.7));

        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].car_id, 5);
        assert_eq!(records[0].frame_nmr, 1);
        assert_eq!(records[0].plate.text, "BBB");
        assert!((records[0].combined_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_tie_keeps_first() {
        let mut agg = BestDetectionAggregator::new();
        assert!(agg.observe(3, 1, car(), observation("FIRST", 0.8, 0.6)));
        assert!(!agg.observe(4, 1, car(), observation("SECOND", 0.6, 0.8)));
        assert_eq!(agg.best(1).unwrap().plate.text, "FIRST");
    }

    #[test]
    fn test_records_ordered_by_vehicle_id() {
        let mut agg = BestDetectionAggregator::new();
        agg.observe(0, 9, car(), observation("NINE", 0.5, 0.5));
        agg.observe(0, 2, car(), observation("TWO", 0.5, 0.5));
        agg.observe(1, 4, car(), observation("FOUR", 0.5, 0.5));

        let ids: Vec<u64> = agg.finalize().iter().map(|r| r.car_id).collect();
        assert_eq!(ids, vec![2, 4, 9]);
    }

    #[test]
    fn test_counters() {
        let mut agg = BestDetectionAggregator::new();
        agg.record_frame();
        agg.record_frame();
        agg.observe(1, 1, car(), observation("X", 0.5, 0.5));
        agg.observe(1, 1, car(), observation("Y", 0.4, 0.5));
        assert_eq!(agg.frames_analyzed(), 2);
        assert_eq!(agg.total_detections(), 2);
        assert_eq!(agg.unique_vehicles(), 1);
    }
}
