use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::RgbImage;
use platetrack_rs::integration::{
    DiscardFrames, FrameSink, ImageSequence, ImageSequenceWriter, PlatePrediction,
    ReplayDetector, RoboflowPlateDetector,
};
use platetrack_rs::{Error, PipelineConfig, PlateDetector, PlatePipeline, write_csv};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "platetrack", about = "Track vehicles and read their license plates")]
struct Args {
    /// Directory of frame images, processed in file-name order
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,
    /// Vehicle detections as JSON lines, one object per frame
    #[arg(long, value_name = "JSONL")]
    vehicles: PathBuf,
    /// Plate detections as JSON lines; the hosted plate service is used when absent
    #[arg(long, value_name = "JSONL")]
    plates: Option<PathBuf>,
    #[arg(long, value_name = "YAML")]
    config: Option<PathBuf>,
    /// Overrides `output.csv_path`
    #[arg(long, value_name = "CSV")]
    output: Option<PathBuf>,
    /// Overrides `output.annotated_dir`
    #[arg(long, value_name = "DIR")]
    annotated: Option<PathBuf>,
    /// Skip writing annotated frames
    #[arg(long)]
    no_annotated: bool,
}

enum PlateSource {
    Replay(ReplayDetector),
    Service(RoboflowPlateDetector),
}

impl PlateDetector for PlateSource {
    type Error = Error;

    fn detect_plates(&mut self, frame: &RgbImage) -> Result<Vec<PlatePrediction>, Error> {
        match self {
            Self::Replay(replay) => replay.detect_plates(frame),
            Self::Service(service) => service.detect_plates(frame),
        }
    }
}

#[cfg(feature = "tesseract")]
type Ocr = platetrack_rs::integration::TesseractOcr;

#[cfg(feature = "tesseract")]
fn build_ocr(config: &PipelineConfig) -> platetrack_rs::Result<Ocr> {
    Ocr::new(&config.ocr)
}

/// Stands in when no OCR backend is compiled in.
#[cfg(not(feature = "tesseract"))]
enum Ocr {}

#[cfg(not(feature = "tesseract"))]
impl platetrack_rs::OcrEngine for Ocr {
    type Error = Error;

    fn read_text(
        &mut self,
        _crop: &image::GrayImage,
    ) -> Result<Vec<platetrack_rs::plate::OcrCandidate>, Error> {
        match *self {}
    }
}

#[cfg(not(feature = "tesseract"))]
fn build_ocr(_config: &PipelineConfig) -> platetrack_rs::Result<Ocr> {
    Err(Error::invalid_config(
        "no OCR backend compiled in, rebuild with `--features tesseract`",
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("platetrack_rs=info,platetrack=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output.csv_path = output.clone();
    }
    if let Some(dir) = &args.annotated {
        config.output.annotated_dir = Some(dir.clone());
    }
    if args.no_annotated {
        config.output.annotated_dir = None;
    }

    let vehicles = ReplayDetector::open(&args.vehicles)
        .with_context(|| format!("reading vehicle detections {}", args.vehicles.display()))?;
    let plates = match &args.plates {
        Some(path) => PlateSource::Replay(
            ReplayDetector::open(path)
                .with_context(|| format!("reading plate detections {}", path.display()))?,
        ),
        None => {
            let Some(api_key) = config.plate_api_key() else {
                bail!("no --plates file and no plate service API key (set ROBOFLOW_API_KEY)");
            };
            PlateSource::Service(RoboflowPlateDetector::new(&config.plate_service, api_key)?)
        }
    };
    let ocr = build_ocr(&config).context("initializing OCR")?;

    let pipeline = PlatePipeline::new(vehicles, plates, ocr, &config)?;

    let mut source = ImageSequence::open(&args.frames)
        .with_context(|| format!("opening frames {}", args.frames.display()))?;
    if source.is_empty() {
        warn!(dir = %args.frames.display(), "no frames found");
    }
    let mut sink: Box<dyn FrameSink> = match &config.output.annotated_dir {
        Some(dir) => Box::new(ImageSequenceWriter::create(dir)?),
        None => Box::new(DiscardFrames),
    };

    let records = pipeline.run(&mut source, &mut sink)?;
    let written = write_csv(&records, &config.output.csv_path)?;
    info!(path = %written.display(), rows = records.len(), "results written");
    Ok(())
}
