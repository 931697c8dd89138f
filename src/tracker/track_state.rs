/// Lifecycle of a vehicle track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created track, not enough consecutive hits yet
    #[default]
    Tentative,
    /// Current hit streak has reached the minimum, so the track is reported
    Confirmed,
    /// Exceeded the allowed unmatched frames or diverged; dropped at the end of the frame
    Deleted,
}
