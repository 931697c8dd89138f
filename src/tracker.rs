mod kalman_filter;
mod kalman_track;
mod matching;
mod rect;
mod sort_tracker;
mod track_state;

pub use kalman_filter::KalmanFilter;
pub use kalman_track::KalmanTrack;
pub use matching::{AssignmentResult, Detection, associate, linear_assignment};
pub use rect::{Rect, iou_batch};
pub use sort_tracker::{SortTracker, TrackedBox, TrackerConfig};
pub use track_state::TrackState;
