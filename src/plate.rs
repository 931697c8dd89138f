//! Plate handling downstream of the tracker: vehicle assignment, text
//! normalisation, per-vehicle aggregation and CSV output.

mod aggregator;
mod containment;
mod output;
mod text;

pub use aggregator::{BestDetectionAggregator, BestRecord, PlateObservation};
pub use containment::find_vehicle;
pub use output::{CSV_HEADER, fallback_path, format_row, parse_row, read_csv, write_csv, write_records};
pub use text::{
    OcrCandidate, PLATE_LEN, PlateReading, format_license, license_complies_format,
    read_license_plate,
};
