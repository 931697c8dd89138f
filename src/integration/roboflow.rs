//! Hosted plate detection over HTTP.
//!
//! Frames are sent as base64 JPEG bodies to `{api_url}/{model_id}` and the
//! service answers with center-form predictions.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use image::{ImageFormat, RgbImage};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use super::{PlateDetector, PlatePrediction};
use crate::config::PlateServiceConfig;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    predictions: Vec<PlatePrediction>,
}

pub struct RoboflowPlateDetector {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RoboflowPlateDetector {
    pub fn new(config: &PlateServiceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint(config),
            api_key: api_key.into(),
        })
    }
}

fn endpoint(config: &PlateServiceConfig) -> String {
    format!(
        "{}/{}",
        config.api_url.trim_end_matches('/'),
        config.model_id.trim_start_matches('/')
    )
}

/// JPEG-encode a frame and wrap it in base64.
fn encode_frame(frame: &RgbImage) -> Result<String> {
    let mut jpeg = Vec::new();
    frame.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
}

/// Drops the request URL, which carries the API key, from transport errors.
fn redact(err: reqwest::Error) -> Error {
    Error::Http(err.without_url())
}

fn parse_predictions(body: &str) -> Result<Vec<PlatePrediction>> {
    let response: InferenceResponse = serde_json::from_str(body)?;
    Ok(response.predictions)
}

impl PlateDetector for RoboflowPlateDetector {
    type Error = Error;

    fn detect_plates(&mut self, frame: &RgbImage) -> Result<Vec<PlatePrediction>> {
        let body = encode_frame(frame)?;
        let response = self
            .client
            .post(format!("{}?api_key={}", self.endpoint, self.api_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(redact)?;

        let status = response.status();
        let text = response.text().map_err(redact)?;
        if !status.is_success() {
            return Err(Error::PlateService {
                status: status.as_u16(),
                body: text,
            });
        }

        let predictions = parse_predictions(&text)?;
        debug!(plates = predictions.len(), "plate service response");
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predictions_ignores_extra_fields() {
        let body = r#"{
            "time": 0.05,
            "image": {"width": 640, "height": 480},
            "predictions": [
                {"x": 320.5, "y": 240.0, "width": 80.0, "height": 20.0,
                 "confidence": 0.91, "class": "license-plate", "class_id": 0,
                 "detection_id": "abc"}
            ]
        }"#;
        let predictions = parse_predictions(body).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].x, 320.5);
        assert_eq!(predictions[0].confidence, 0.91);
    }

    #[test]
    fn test_parse_missing_predictions() {
        assert!(parse_predictions("{}").unwrap().is_empty());
    }

    #[test]
    fn test_encode_frame_is_base64_jpeg() {
        let encoded = encode_frame(&RgbImage::new(16, 16)).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let config = PlateServiceConfig {
            api_url: "https://example.test/".to_string(),
            model_id: "plates/4".to_string(),
            ..PlateServiceConfig::default()
        };
        assert_eq!(endpoint(&config), "https://example.test/plates/4");
    }

    #[test]
    fn test_transport_error_hides_api_key() {
        let config = PlateServiceConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..PlateServiceConfig::default()
        };
        let mut detector = RoboflowPlateDetector::new(&config, "SECRETKEY123").unwrap();
        let err = detector.detect_plates(&RgbImage::new(8, 8)).unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(!err.to_string().contains("SECRETKEY123"));
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }
}
