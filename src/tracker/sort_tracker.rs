//! SORT multi-object tracker: predict, associate, update, manage lifecycle.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::kalman_track::KalmanTrack;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Configuration for the SortTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames a track may go unmatched before it is removed
    pub max_age: u32,
    /// Consecutive hits before a track is reported
    pub min_hits: u32,
    /// Minimum IoU for a detection to be matched to a track
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 1,
            min_hits: 3,
            iou_threshold: 0.3,
        }
    }
}

/// A reported track for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBox {
    pub bbox: Rect,
    pub track_id: u64,
}

pub struct SortTracker {
    tracks: Vec<KalmanTrack>,
    frame_count: u32,
    next_id: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
}

impl SortTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            frame_count: 0,
            next_id: 1,
            config,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames processed so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// All live tracks, including ones not reported this frame.
    pub fn tracks(&self) -> &[KalmanTrack] {
        &self.tracks
    }

    /// Process one frame of detections and return the tracks to report.
    ///
    /// An empty detection list is valid and only ages the existing tracks.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedBox> {
        self.frame_count += 1;

        // Step 1: Predict, marking tracks whose state has blown up
        let predicted = KalmanTrack::multi_predict(&mut self.tracks, &self.kalman_filter);
        let mut pool_rects = Vec::with_capacity(self.tracks.len());
        for (track, rect) in self.tracks.iter_mut().zip(predicted) {
            if rect.is_finite() {
                pool_rects.push(rect);
            } else {
                debug!(track_id = track.track_id, "dropping track with non-finite prediction");
                track.mark_deleted();
            }
        }
        self.tracks.retain(|t| t.state != TrackState::Deleted);

        // Step 2: Associate
        let det_rects: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::associate(&pool_rects, &det_rects, self.config.iou_threshold);

        // Step 3: Update matched tracks
        for (itracked, idet) in matches {
            let track = &mut self.tracks[itracked];
            track.update(&detections[idet], &self.kalman_filter);
            track.confirm_if_ready(self.config.min_hits);
        }

        // Step 4: Unmatched tracks keep the miss counted by predict
        for idx in unmatched_tracks {
            let track = &self.tracks[idx];
            trace!(
                track_id = track.track_id,
                time_since_update = track.time_since_update,
                "track unmatched"
            );
        }

        // Step 5: Init new tracks
        for idx in unmatched_detections {
            let track_id = self.next_id;
            self.next_id += 1;
            debug!(track_id, frame = self.frame_count, "new track");
            let mut track = KalmanTrack::new(track_id, &detections[idx], &self.kalman_filter);
            track.confirm_if_ready(self.config.min_hits);
            self.tracks.push(track);
        }

        // Step 6: Remove stale tracks
        let max_age = self.config.max_age;
        for track in self.tracks.iter_mut().filter(|t| t.time_since_update > max_age) {
            debug!(track_id = track.track_id, "removing stale track");
            track.mark_deleted();
        }
        self.tracks.retain(|t| t.state != TrackState::Deleted);

        // Step 7: Report
        let min_hits = self.config.min_hits;
        let in_startup = self.frame_count <= min_hits;
        self.tracks
            .iter()
            .filter(|t| t.time_since_update < 1 && (t.state == TrackState::Confirmed || in_startup))
            .map(|t| TrackedBox {
                bbox: t.get_state(),
                track_id: t.track_id,
            })
            .collect()
    }
}
