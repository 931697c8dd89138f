//! Single vehicle track backed by the SORT Kalman filter.

use ndarray::{Array1, Array2};
use tracing::warn;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Smallest scale (area) and aspect ratio a prediction may start from.
const MIN_SHAPE: f64 = 1e-3;

/// Single object track.
#[derive(Debug, Clone)]
pub struct KalmanTrack {
    /// Unique track identifier, never reused within one tracker
    pub track_id: u64,
    /// Confirmed while the current hit streak has reached `min_hits`
    pub state: TrackState,
    /// Number of predictions made, one per frame
    pub age: u32,
    /// Total number of matched detections
    pub hits: u32,
    /// Consecutive frames with a matched detection
    pub hit_streak: u32,
    /// Consecutive predictions without a matched detection
    pub time_since_update: u32,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl KalmanTrack {
    /// Start a track on an unmatched detection.
    pub fn new(track_id: u64, detection: &Detection, kalman_filter: &KalmanFilter) -> Self {
        let (mean, covariance) = kalman_filter.initiate(detection.bbox.to_z());
        Self {
            track_id,
            state: TrackState::Tentative,
            age: 0,
            hits: 0,
            hit_streak: 0,
            time_since_update: 0,
            mean,
            covariance,
        }
    }

    /// Advance the state by one frame and return the predicted box.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) -> Rect {
        // Keep the area from going negative on the next step
        if self.mean[6] + self.mean[2] <= 0.0 {
            self.mean[6] = 0.0;
        }
        self.mean[2] = self.mean[2].max(MIN_SHAPE);
        self.mean[3] = self.mean[3].max(MIN_SHAPE);

        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;

        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
            if self.state == TrackState::Confirmed {
                self.state = TrackState::Tentative;
            }
        }
        self.time_since_update += 1;

        self.get_state()
    }

    /// Correct the state with a matched detection.
    pub fn update(&mut self, detection: &Detection, kalman_filter: &KalmanFilter) {
        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;

        let measurement = detection.bbox.to_z();
        match kalman_filter.update(&self.mean, &self.covariance, measurement) {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => {
                warn!(
                    track_id = self.track_id,
                    "singular innovation covariance, restarting track state on measurement"
                );
                let (mean, covariance) = kalman_filter.initiate(measurement);
                self.mean = mean;
                self.covariance = covariance;
            }
        }
    }

    /// Current box estimate.
    pub fn get_state(&self) -> Rect {
        Rect::from_z([self.mean[0], self.mean[1], self.mean[2], self.mean[3]])
    }

    /// Promote to confirmed once the hit streak reaches `min_hits`. A broken
    /// streak demotes the track again on the next prediction.
    pub fn confirm_if_ready(&mut self, min_hits: u32) {
        if self.state == TrackState::Tentative && self.hit_streak >= min_hits {
            self.state = TrackState::Confirmed;
        }
    }

    pub fn mark_deleted(&mut self) {
        self.state = TrackState::Deleted;
    }

    pub fn multi_predict(tracks: &mut [KalmanTrack], kalman_filter: &KalmanFilter) -> Vec<Rect> {
        tracks
            .iter_mut()
            .map(|track| track.predict(kalman_filter))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(x1, y1, x2, y2, 0.9)
    }

    #[test]
    fn test_new_track_state_matches_detection() {
        let kf = KalmanFilter::new();
        let track = KalmanTrack::new(1, &det(10.0, 20.0, 50.0, 80.0), &kf);
        let [x1, y1, x2, y2] = track.get_state().to_tlbr();
        assert_abs_diff_eq!(x1, 10.0, epsilon = 1e-3);
        assert_abs_diff_eq!(y1, 20.0, epsilon = 1e-3);
        assert_abs_diff_eq!(x2, 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(y2, 80.0, epsilon = 1e-3);
        assert_eq!(track.state, TrackState::Tentative);
    }

    #[test]
    fn test_counters() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &det(0.0, 0.0, 10.0, 10.0), &kf);

        track.predict(&kf);
        assert_eq!(track.age, 1);
        assert_eq!(track.time_since_update, 1);

        track.update(&det(0.0, 0.0, 10.0, 10.0), &kf);
        assert_eq!(track.time_since_update, 0);
        assert_eq!(track.hits, 1);
        assert_eq!(track.hit_streak, 1);

        // a missed frame breaks the streak on the following prediction
        track.predict(&kf);
        track.predict(&kf);
        assert_eq!(track.hit_streak, 0);
        assert_eq!(track.time_since_update, 2);
        assert_eq!(track.hits, 1);
    }

    #[test]
    fn test_confirmation() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &det(0.0, 0.0, 10.0, 10.0), &kf);
        for _ in 0..3 {
            track.predict(&kf);
            track.update(&det(0.0, 0.0, 10.0, 10.0), &kf);
            track.confirm_if_ready(3);
        }
        assert_eq!(track.state, TrackState::Confirmed);

        // one missed frame drops it back until the streak is rebuilt
        track.predict(&kf);
        track.predict(&kf);
        assert_eq!(track.state, TrackState::Tentative);
        track.update(&det(0.0, 0.0, 10.0, 10.0), &kf);
        track.confirm_if_ready(3);
        assert_eq!(track.state, TrackState::Tentative);
    }

    #[test]
    fn test_shrinking_box_prediction_stays_finite() {
        let kf = KalmanFilter::new();
        let mut track = KalmanTrack::new(1, &det(0.0, 0.0, 40.0, 40.0), &kf);
        // collapse the box quickly so the area velocity turns strongly negative
        for size in [30.0, 20.0, 10.0, 4.0, 1.0] {
            track.predict(&kf);
            track.update(&det(0.0, 0.0, size, size), &kf);
        }
        for _ in 0..10 {
            assert!(track.predict(&kf).is_finite());
        }
    }

    #[test]
    fn test_prediction_error_converges_on_constant_velocity() {
        let kf = KalmanFilter::new();
        let box_at = |t: f32| det(100.0 + 5.0 * t, 50.0 + 2.0 * t, 180.0 + 5.0 * t, 110.0 + 2.0 * t);
        let mut track = KalmanTrack::new(1, &box_at(0.0), &kf);

        let mut errors = Vec::new();
        for t in 1..40 {
            let truth = box_at(t as f32).bbox;
            let predicted = track.predict(&kf);
            let (pcx, pcy) = predicted.center();
            let (tcx, tcy) = truth.center();
            errors.push(((pcx - tcx).powi(2) + (pcy - tcy).powi(2)).sqrt());
            track.update(&box_at(t as f32), &kf);
        }

        assert!(errors[errors.len() - 1] < errors[0]);
        assert!(errors[errors.len() - 1] < 1.0);
        assert!(errors.iter().all(|e| *e < 10.0));
    }
}
