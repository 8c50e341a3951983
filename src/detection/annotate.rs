//! Draws detections onto a copy of the snapshot.
//!
//! Each box gets a 2 px outline in `#39ff14` and a white `"{query}: {score}"`
//! label anchored at its top-left corner, set in the bundled DejaVu Sans Mono.

use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::{BoundingBox, DetectionError, DetectionResult};
use crate::constants::DETECTION_QUERIES;

pub const BOX_COLOR: Rgb<u8> = Rgb([0x39, 0xff, 0x14]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// Label height in pixels.
pub const LABEL_SCALE: f32 = 14.0;

const BOX_WIDTH: u32 = 2;
const UNKNOWN_QUERY: &str = "object";

static LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

/// Standard, padded base64 of `bytes`.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Text drawn next to a box, e.g. `"solar panel: 0.87"`.
pub fn label_text(label: usize, score: f32) -> String {
    let query = DETECTION_QUERIES.get(label).copied().unwrap_or(UNKNOWN_QUERY);
    format!("{query}: {score:.2}")
}

fn label_font() -> Result<FontRef<'static>, DetectionError> {
    FontRef::try_from_slice(LABEL_FONT).map_err(|e| DetectionError::Render {
        reason: format!("label font: {e}"),
    })
}

/// Decodes `image`, draws every detection in `result` and re-encodes as PNG.
pub fn render_detections(image: &[u8], result: &DetectionResult) -> Result<Vec<u8>, DetectionError> {
    let mut canvas = image::load_from_memory(image)
        .map_err(|e| DetectionError::Render {
            reason: e.to_string(),
        })?
        .to_rgb8();

    if !result.is_empty() {
        let font = label_font()?;
        for (label, score, bbox) in result.iter() {
            let Some(rect) = PixelRect::clamped(bbox, canvas.width(), canvas.height()) else {
                continue;
            };
            draw_outline(&mut canvas, rect);
            draw_text_mut(
                &mut canvas,
                LABEL_COLOR,
                rect.x0 as i32,
                rect.y0 as i32,
                PxScale::from(LABEL_SCALE),
                &font,
                &label_text(label, score),
            );
        }
    }

    let mut out = Cursor::new(Vec::new());
    canvas
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| DetectionError::Render {
            reason: e.to_string(),
        })?;
    Ok(out.into_inner())
}

/// Inclusive pixel rectangle inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) x1: u32,
    pub(crate) y1: u32,
}

impl PixelRect {
    pub(crate) fn clamped(bbox: &BoundingBox, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || bbox.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, (max - 1) as f32) as u32;
        let rect = Self {
            x0: clamp(bbox[0], width),
            y0: clamp(bbox[1], height),
            x1: clamp(bbox[2], width),
            y1: clamp(bbox[3], height),
        };
        (rect.x1 > rect.x0 && rect.y1 > rect.y0).then_some(rect)
    }

    fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }
}

/// Nested hollow rectangles, outermost on the box edge.
fn draw_outline(canvas: &mut RgbImage, rect: PixelRect) {
    for inset in 0..BOX_WIDTH {
        let (Some(w), Some(h)) = (
            rect.width().checked_sub(2 * inset),
            rect.height().checked_sub(2 * inset),
        ) else {
            return;
        };
        if w == 0 || h == 0 {
            return;
        }
        let outline = Rect::at((rect.x0 + inset) as i32, (rect.y0 + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(canvas, outline, BOX_COLOR);
    }
}
