//! YAML configuration for the plate pipeline. Every section has defaults, so a
//! partial file (or none at all) is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracker::TrackerConfig;

/// COCO class ids for car, motorcycle, bus and truck.
pub const DEFAULT_VEHICLE_CLASSES: [u32; 4] = [2, 3, 5, 7];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    /// Detector class ids that count as vehicles
    pub vehicle_classes: Vec<u32>,
    pub plate_service: PlateServiceConfig,
    pub ocr: OcrConfig,
    pub annotation: AnnotationConfig,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            vehicle_classes: DEFAULT_VEHICLE_CLASSES.to_vec(),
            plate_service: PlateServiceConfig::default(),
            ocr: OcrConfig::default(),
            annotation: AnnotationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Hosted plate detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateServiceConfig {
    pub api_url: String,
    pub model_id: String,
    /// Falls back to the `ROBOFLOW_API_KEY` environment variable when unset
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PlateServiceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://serverless.roboflow.com".to_string(),
            model_id: "license-plate-recognition-rxg4e/4".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Inverse binary threshold applied to the grayscale crop; `None` keeps grayscale
    pub binarize_threshold: Option<u8>,
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: Some(64),
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// TrueType/OpenType font for labels; boxes are still drawn without one
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
    pub line_thickness: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_scale: 24.0,
            line_thickness: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: PathBuf,
    pub annotated_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("test.csv"),
            annotated_dir: Some(PathBuf::from("output")),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let iou = self.tracker.iou_threshold;
        if !(iou > 0.0 && iou <= 1.0) {
            return Err(Error::invalid_config(format!(
                "tracker.iou_threshold must be in (0, 1], got {iou}"
            )));
        }
        if self.vehicle_classes.is_empty() {
            return Err(Error::invalid_config("vehicle_classes must not be empty"));
        }
        if self.annotation.font_scale <= 0.0 {
            return Err(Error::invalid_config("annotation.font_scale must be positive"));
        }
        Ok(())
    }

    /// API key from the config, else from `ROBOFLOW_API_KEY`.
    pub fn plate_api_key(&self) -> Option<String> {
        self.plate_service
            .api_key
            .clone()
            .or_else(|| std::env::var("ROBOFLOW_API_KEY").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipelineConfig::from_yaml("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.tracker.max_age, 1);
        assert_eq!(config.tracker.min_hits, 3);
        assert_eq!(config.vehicle_classes, vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = "
tracker:
  max_age: 5
ocr:
  binarize_threshold: null
output:
  csv_path: results.csv
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.tracker.max_age, 5);
        assert_eq!(config.tracker.min_hits, 3);
        assert_eq!(config.ocr.binarize_threshold, None);
        assert_eq!(config.output.csv_path, PathBuf::from("results.csv"));
        assert_eq!(config.output.annotated_dir, Some(PathBuf::from("output")));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = PipelineConfig::from_yaml("tracker:\n  iou_threshold: 1.5\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_empty_classes() {
        assert!(PipelineConfig::from_yaml("vehicle_classes: []\n").is_err());
    }
}
