//! Detection-to-track association for multi-object tracking.

use crate::tracker::rect::{Rect, iou_batch};
use ndarray::Array2;

/// Cost given to padding cells of the square assignment matrix.
const PADDING_COST: f64 = 1e6;

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in TLBR format (x1, y1, x2, y2)
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Detector class label, if the detector reports one
    pub class_id: Option<u32>,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            class_id: None,
        }
    }

    pub fn with_class(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// Outcome of one association round. The three sets are disjoint and cover
/// every track and detection index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// Matched (track_idx, detection_idx) pairs
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    fn all_unmatched(num_tracks: usize, num_detections: usize) -> Self {
        Self {
            matches: vec![],
            unmatched_tracks: (0..num_tracks).collect(),
            unmatched_detections: (0..num_detections).collect(),
        }
    }

    /// Build the result from accepted pairs, filling in the unmatched sets.
    fn from_matches(matches: Vec<(usize, usize)>, num_tracks: usize, num_detections: usize) -> Self {
        let mut track_matched = vec![false; num_tracks];
        let mut det_matched = vec![false; num_detections];
        for &(t, d) in &matches {
            track_matched[t] = true;
            det_matched[d] = true;
        }
        Self {
            matches,
            unmatched_tracks: unmatched_indices(&track_matched),
            unmatched_detections: unmatched_indices(&det_matched),
        }
    }
}

fn unmatched_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &matched)| if matched { None } else { Some(i) })
        .collect()
}

/// Minimum-cost assignment on a rectangular cost matrix.
///
/// The matrix is padded to square with a large cost so every real pair is
/// preferred over leaving a row or column unmatched. Returns the raw
/// (row, col) pairs without any gating.
fn solve(cost_matrix: &Array2<f32>) -> Vec<(usize, usize)> {
    let (num_rows, num_cols) = cost_matrix.dim();
    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PADDING_COST);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => row_to_col
            .iter()
            .enumerate()
            .filter(|&(row, &col)| row < num_rows && col < num_cols)
            .map(|(row, &col)| (row, col))
            .collect(),
        Err(err) => {
            tracing::warn!(?err, "linear assignment failed, leaving all pairs unmatched");
            vec![]
        }
    }
}

/// Solve a cost matrix and keep pairs with cost `<= thresh`.
///
/// Pairs above `thresh` are priced like padding before solving, so they can
/// never displace an admissible pair from the optimum.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();
    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult::all_unmatched(num_rows, num_cols);
    }

    let gated = cost_matrix.mapv(|c| if c <= thresh { c } else { PADDING_COST as f32 });
    let matches = solve(&gated)
        .into_iter()
        .filter(|&(row, col)| cost_matrix[[row, col]] <= thresh)
        .collect();

    AssignmentResult::from_matches(matches, num_rows, num_cols)
}

/// Associate predicted track boxes with detection boxes by maximum total IoU.
///
/// Pairs below `iou_threshold` are rejected even when they are the best
/// available. When every track and every detection has at most one candidate
/// above the threshold, the candidates are taken directly.
pub fn associate(track_boxes: &[Rect], det_boxes: &[Rect], iou_threshold: f32) -> AssignmentResult {
    let num_tracks = track_boxes.len();
    let num_dets = det_boxes.len();
    if num_tracks == 0 || num_dets == 0 {
        return AssignmentResult::all_unmatched(num_tracks, num_dets);
    }

    let ious = iou_batch(track_boxes, det_boxes);
    let candidates = ious.mapv(|iou| iou > iou_threshold);
    let unique_rows = candidates
        .rows()
        .into_iter()
        .all(|row| row.iter().filter(|&&c| c).count() <= 1);
    let unique_cols = candidates
        .columns()
        .into_iter()
        .all(|col| col.iter().filter(|&&c| c).count() <= 1);

    let pairs: Vec<(usize, usize)> = if unique_rows && unique_cols {
        candidates
            .indexed_iter()
            .filter_map(|((t, d), &c)| if c { Some((t, d)) } else { None })
            .collect()
    } else {
        linear_assignment(&ious.mapv(|iou| 1.0 - iou), 1.0 - iou_threshold).matches
    };

    let matches = pairs
        .into_iter()
        .filter(|&(t, d)| ious[[t, d]] >= iou_threshold)
        .collect();

    AssignmentResult::from_matches(matches, num_tracks, num_dets)
}
