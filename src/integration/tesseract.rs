//! Tesseract OCR through leptess, tuned for single-line plate crops.

use std::ffi::CString;

use image::GrayImage;
use leptess::tesseract::TessApi;
use tracing::trace;

use super::OcrEngine;
use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::plate::OcrCandidate;

const PLATE_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Treat the image as a single text line.
const PAGE_SEG_SINGLE_LINE: &str = "7";

pub struct TesseractOcr {
    api: TessApi,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let datapath = config
            .tessdata_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned());
        let mut api = TessApi::new(datapath.as_deref(), &config.language)
            .map_err(|e| Error::ocr(format!("tesseract init failed: {e:?}")))?;

        set_variable(&mut api, "tessedit_char_whitelist", PLATE_WHITELIST)?;
        set_variable(&mut api, "tessedit_pageseg_mode", PAGE_SEG_SINGLE_LINE)?;
        Ok(Self { api })
    }
}

fn set_variable(api: &mut TessApi, name: &str, value: &str) -> Result<()> {
    let name_c = CString::new(name).map_err(|e| Error::ocr(e.to_string()))?;
    let value_c = CString::new(value).map_err(|e| Error::ocr(e.to_string()))?;
    api.raw
        .set_variable(&name_c, &value_c)
        .map_err(|e| Error::ocr(format!("cannot set {name}: {e:?}")))
}

impl OcrEngine for TesseractOcr {
    type Error = Error;

    fn read_text(&mut self, crop: &GrayImage) -> Result<Vec<OcrCandidate>> {
        let (width, height) = crop.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        self.api
            .raw
            .set_image(crop.as_raw(), width as i32, height as i32, 1, width as i32)
            .map_err(|e| Error::ocr(format!("{e:?}")))?;

        let text = self
            .api
            .get_utf8_text()
            .map_err(|e| Error::ocr(e.to_string()))?;
        let confidence = self.api.mean_text_conf().clamp(0, 100) as f32 / 100.0;
        trace!(text = text.trim(), confidence, "tesseract read");

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| OcrCandidate::new(line, confidence))
            .collect())
    }
}
