//! CSV output of best records, one row per vehicle.
//!
//! Bounding boxes are written as `[x1 y1 x2 y2]` so the file stays a plain
//! comma separated table without quoting.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::plate::aggregator::{BestRecord, PlateObservation};
use crate::tracker::Rect;

pub const CSV_HEADER: &str = "frame_nmr,car_id,car_bbox,license_plate_bbox,license_plate_bbox_score,license_number,license_number_score";

const FIELD_COUNT: usize = 7;

/// Sibling path used when the target cannot be opened: `out.csv` becomes `out_new.csv`.
pub fn fallback_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}_new.{}", ext.to_string_lossy()),
        None => format!("{stem}_new"),
    };
    path.with_file_name(file_name)
}

fn format_bbox(rect: &Rect) -> String {
    let [x1, y1, x2, y2] = rect.to_tlbr();
    format!("[{x1:?} {y1:?} {x2:?} {y2:?}]")
}

fn parse_bbox(field: &str) -> std::result::Result<Rect, String> {
    let inner = field
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| format!("bbox not bracketed: {field:?}"))?;
    let values = inner
        .split_whitespace()
        .map(|v| v.parse::<f32>().map_err(|e| format!("bad coordinate {v:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match values[..] {
        [x1, y1, x2, y2] => Ok(Rect::from_tlbr(x1, y1, x2, y2)),
        _ => Err(format!("expected 4 coordinates, got {}", values.len())),
    }
}

/// Format one record as a CSV row, without the line terminator.
pub fn format_row(record: &BestRecord) -> String {
    format!(
        "{},{},{},{},{:?},{},{:?}",
        record.frame_nmr,
        record.car_id,
        format_bbox(&record.car_bbox),
        format_bbox(&record.plate.bbox),
        record.plate.bbox_score,
        record.plate.text,
        record.plate.text_score,
    )
}

/// Parse one CSV row produced by [`format_row`].
pub fn parse_row(line: &str) -> std::result::Result<BestRecord, String> {
    let fields: Vec<&str> = line.trim_end().split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!("expected {FIELD_COUNT} fields, got {}", fields.len()));
    }

    let frame_nmr = fields[0]
        .parse()
        .map_err(|e| format!("bad frame_nmr {:?}: {e}", fields[0]))?;
    let car_id = fields[1]
        .parse()
        .map_err(|e| format!("bad car_id {:?}: {e}", fields[1]))?;
    let car_bbox = parse_bbox(fields[2])?;
    let plate_bbox = parse_bbox(fields[3])?;
    let bbox_score: f32 = fields[4]
        .parse()
        .map_err(|e| format!("bad license_plate_bbox_score {:?}: {e}", fields[4]))?;
    let text_score: f32 = fields[6]
        .parse()
        .map_err(|e| format!("bad license_number_score {:?}: {e}", fields[6]))?;

    let plate = PlateObservation {
        bbox: plate_bbox,
        bbox_score,
        text: fields[5].to_string(),
        text_score,
    };
    Ok(BestRecord {
        frame_nmr,
        car_id,
        car_bbox,
        combined_score: plate.combined_score(),
        plate,
    })
}

/// Write the header and one row per record to `out`.
pub fn write_records<W: Write>(mut out: W, records: &[BestRecord]) -> io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for record in records {
        writeln!(out, "{}", format_row(record))?;
    }
    out.flush()
}

/// Write records to `path`, falling back to the `_new` sibling on a permission error.
///
/// Returns the path that was actually written. Any other I/O error is returned.
pub fn write_csv(records: &[BestRecord], path: &Path) -> Result<PathBuf> {
    write_csv_with(records, path, |p: &Path| File::create(p))
}

fn write_csv_with<F>(records: &[BestRecord], path: &Path, create: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> io::Result<File>,
{
    let (file, written_path) = match create(path) {
        Ok(file) => (file, path.to_path_buf()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            let alternative = fallback_path(path);
            warn!(
                original = %path.display(),
                fallback = %alternative.display(),
                "output file is locked, writing to fallback path"
            );
            (create(&alternative)?, alternative)
        }
        Err(err) => return Err(err.into()),
    };

    write_records(BufWriter::new(file), records)?;
    info!(
        path = %written_path.display(),
        rows = records.len(),
        "results saved, one best detection per vehicle"
    );
    Ok(written_path)
}

/// Load records written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<BestRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        let record = parse_row(&line).map_err(|reason| Error::MalformedRecord {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        records.push(record);
    }
    Ok(records)
}
