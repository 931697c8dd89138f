//! Plate-to-vehicle assignment by strict geometric containment.

use crate::tracker::{Rect, TrackedBox};

/// Find the vehicle whose box strictly contains the plate box.
///
/// Vehicles are scanned in track-list order and the first container wins, even
/// when a later vehicle would fit the plate more tightly. Returns `None` when no
/// vehicle encloses the plate.
pub fn find_vehicle<'a>(plate: &Rect, vehicles: &'a [TrackedBox]) -> Option<&'a TrackedBox> {
    vehicles.iter().find(|v| v.bbox.strictly_contains(plate))
}
