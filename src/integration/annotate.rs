//! Frame annotation: vehicle boxes in green, plate boxes in red and the
//! recognised plate text above its vehicle on a filled red background.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use tracing::debug;

use crate::config::AnnotationConfig;
use crate::error::{Error, Result};
use crate::tracker::Rect;

pub const VEHICLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const PLATE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_PADDING: i32 = 4;

pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
    thickness: u32,
}

impl Annotator {
    /// Boxes only, no labels.
    pub fn without_font(thickness: u32) -> Self {
        Self {
            font: None,
            scale: PxScale::from(24.0),
            thickness,
        }
    }

    pub fn from_config(config: &AnnotationConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                let font = FontVec::try_from_vec(bytes).map_err(|e| {
                    Error::invalid_config(format!("unreadable font {}: {e}", path.display()))
                })?;
                Some(font)
            }
            None => {
                debug!("no annotation font configured, labels are skipped");
                None
            }
        };
        Ok(Self {
            font,
            scale: PxScale::from(config.font_scale),
            thickness: config.line_thickness.max(1),
        })
    }

    pub fn draw_vehicle(&self, frame: &mut RgbImage, bbox: &Rect, track_id: u64) {
        self.draw_box(frame, bbox, VEHICLE_COLOR);
        let [x1, y1, _, _] = bbox.to_tlbr();
        self.draw_label(frame, x1 as i32, y1 as i32, &format!("Vehicle {track_id}"), VEHICLE_COLOR, None);
    }

    pub fn draw_plate(&self, frame: &mut RgbImage, bbox: &Rect, confidence: f32) {
        self.draw_box(frame, bbox, PLATE_COLOR);
        let [x1, y1, _, _] = bbox.to_tlbr();
        self.draw_label(
            frame,
            x1 as i32,
            y1 as i32,
            &format!("License Plate ({confidence:.2})"),
            PLATE_COLOR,
            None,
        );
    }

    /// Plate text above the vehicle box on a filled red background.
    pub fn draw_plate_text(&self, frame: &mut RgbImage, vehicle: &Rect, text: &str) {
        let [x1, y1, _, _] = vehicle.to_tlbr();
        self.draw_label(frame, x1 as i32, y1 as i32, text, TEXT_COLOR, Some(PLATE_COLOR));
    }

    fn draw_box(&self, frame: &mut RgbImage, bbox: &Rect, color: Rgb<u8>) {
        let Some(rect) = to_pixel_rect(bbox) else {
            return;
        };
        // Thick border by drawing nested rectangles
        for offset in 0..self.thickness as i32 {
            let grown = PixelRect::at(rect.left() - offset, rect.top() - offset).of_size(
                rect.width() + (offset * 2) as u32,
                rect.height() + (offset * 2) as u32,
            );
            draw_hollow_rect_mut(frame, grown, color);
        }
    }

    /// Label whose bottom-left corner sits just above `(x, bottom)`.
    fn draw_label(
        &self,
        frame: &mut RgbImage,
        x: i32,
        bottom: i32,
        text: &str,
        color: Rgb<u8>,
        background: Option<Rgb<u8>>,
    ) {
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(self.scale, font, text),
            None => (
                (text.chars().count() as f32 * self.scale.x * 0.6) as u32,
                self.scale.y as u32,
            ),
        };
        let top = bottom - text_h as i32 - 2 * LABEL_PADDING;

        if let Some(bg) = background {
            let bg_rect = PixelRect::at(x, top).of_size(
                (text_w as i32 + 2 * LABEL_PADDING).max(1) as u32,
                (text_h as i32 + 2 * LABEL_PADDING).max(1) as u32,
            );
            draw_filled_rect_mut(frame, bg_rect, bg);
        }
        if let Some(font) = &self.font {
            draw_text_mut(frame, color, x + LABEL_PADDING, top + LABEL_PADDING, self.scale, font, text);
        }
    }
}

fn to_pixel_rect(bbox: &Rect) -> Option<PixelRect> {
    if !bbox.is_finite() {
        return None;
    }
    let [x1, y1, x2, y2] = bbox.to_tlbr();
    let width = (x2 - x1).round().max(1.0) as u32;
    let height = (y2 - y1).round().max(1.0) as u32;
    Some(PixelRect::at(x1 as i32, y1 as i32).of_size(width, height))
}
