use std::collections::VecDeque;
use std::fs;

use image::{GrayImage, RgbImage};
use platetrack_rs::integration::{FrameSink, FrameSource, PlatePrediction};
use platetrack_rs::plate::{CSV_HEADER, OcrCandidate, read_csv};
use platetrack_rs::{
    Detection, OcrEngine, PipelineConfig, PlateDetector, PlatePipeline, VehicleDetector, write_csv,
};

struct Frames(VecDeque<RgbImage>);

impl Frames {
    fn blank(count: usize) -> Self {
        Self((0..count).map(|_| RgbImage::new(640, 480)).collect())
    }
}

impl FrameSource for Frames {
    fn next_frame(&mut self) -> platetrack_rs::Result<Option<RgbImage>> {
        Ok(self.0.pop_front())
    }
}

#[derive(Default)]
struct CollectFrames(Vec<u64>);

impl FrameSink for CollectFrames {
    fn write_frame(&mut self, frame_nmr: u64, _frame: &RgbImage) -> platetrack_rs::Result<()> {
        self.0.push(frame_nmr);
        Ok(())
    }
}

/// Same car every frame; fails on the frames listed in `fail_on`.
struct Car {
    calls: u64,
    fail_on: Vec<u64>,
}

impl VehicleDetector for Car {
    type Error = String;

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, String> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err("model crashed".to_string());
        }
        Ok(vec![
            Detection::new(100.0, 100.0, 300.0, 250.0, 0.9).with_class(2),
        ])
    }
}

struct Plate;

impl PlateDetector for Plate {
    type Error = String;

    fn detect_plates(&mut self, _frame: &RgbImage) -> Result<Vec<PlatePrediction>, String> {
        Ok(vec![PlatePrediction {
            x: 200.0,
            y: 215.0,
            width: 100.0,
            height: 30.0,
            confidence: 0.8,
        }])
    }
}

/// Reads the same plate with scripted confidences.
struct ScriptedOcr(VecDeque<f32>);

impl OcrEngine for ScriptedOcr {
    type Error = String;

    fn read_text(&mut self, _crop: &GrayImage) -> Result<Vec<OcrCandidate>, String> {
        let confidence = self.0.pop_front().ok_or("script exhausted")?;
        Ok(vec![OcrCandidate::new("MH12ABC", confidence)])
    }
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("platetrack_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_best_read_reaches_csv() {
    let pipeline = PlatePipeline::new(
        Car {
            calls: 0,
            fail_on: vec![],
        },
        Plate,
        ScriptedOcr(VecDeque::from([0.4, 0.6, 0.9])),
        &PipelineConfig::default(),
    )
    .unwrap();

    let mut sink = CollectFrames::default();
    let records = pipeline.run(&mut Frames::blank(3), &mut sink).unwrap();
    assert_eq!(sink.0, vec![0, 1, 2]);

    assert_eq!(records.len(), 1);
    let best = &records[0];
    assert_eq!(best.car_id, 1);
    assert_eq!(best.frame_nmr, 2);
    assert_eq!(best.plate.text, "MH12ABC");
    assert!((best.combined_score - 0.85).abs() < 1e-6);

    let dir = temp_dir("pipeline_csv");
    let path = dir.join("results.csv");
    let written = write_csv(&records, &path).unwrap();
    let contents = fs::read_to_string(&written).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("2,1,[100.0 100.0 300.0 250.0],[150.0 200.0 250.0 230.0],0.8,MH12ABC,0.9"));

    let read_back = read_csv(&written).unwrap();
    assert_eq!(read_back.len(), 1);
    assert_eq!(read_back[0].frame_nmr, 2);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_detector_failure_is_absorbed() {
    let pipeline = PlatePipeline::new(
        Car {
            calls: 0,
            fail_on: vec![1],
        },
        Plate,
        ScriptedOcr(VecDeque::from([0.5, 0.5, 0.5])),
        &PipelineConfig::default(),
    )
    .unwrap();

    let mut sink = CollectFrames::default();
    let records = pipeline.run(&mut Frames::blank(3), &mut sink).unwrap();

    // All frames are still written, the failed frame just has no vehicles
    assert_eq!(sink.0, vec![0, 1, 2]);
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.plate.text == "MH12ABC"));
    // Ties keep the earliest read
    assert_eq!(records[0].frame_nmr, 0);
}

#[test]
fn test_no_plates_gives_header_only_csv() {
    struct NoPlates;

    impl PlateDetector for NoPlates {
        type Error = String;

        fn detect_plates(&mut self, _frame: &RgbImage) -> Result<Vec<PlatePrediction>, String> {
            Ok(vec![])
        }
    }

    let pipeline = PlatePipeline::new(
        Car {
            calls: 0,
            fail_on: vec![],
        },
        NoPlates,
        ScriptedOcr(VecDeque::new()),
        &PipelineConfig::default(),
    )
    .unwrap();
    let records = pipeline
        .run(&mut Frames::blank(2), &mut CollectFrames::default())
        .unwrap();
    assert!(records.is_empty());

    let dir = temp_dir("pipeline_empty");
    let written = write_csv(&records, &dir.join("empty.csv")).unwrap();
    assert_eq!(fs::read_to_string(&written).unwrap().trim_end(), CSV_HEADER);
    fs::remove_dir_all(&dir).ok();
}
