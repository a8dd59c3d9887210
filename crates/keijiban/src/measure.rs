//! Height estimation for pagination.
//!
//! The real preview is laid out by a browser; pagination only needs a
//! consistent estimate of how tall each block will render.

use std::io::Cursor;

use crate::model::{ImageData, Layout};
use crate::text_width::TextWidthCalculator;

/// A4 width at 96 dpi.
pub const PAGE_WIDTH_PX: f32 = 793.7;
pub const BODY_LINE_HEIGHT: f32 = 1.8;

const HEADING_SCALE: f32 = 1.4;
const HEADING_LINE_HEIGHT: f32 = 1.4;
const HEADING_GAP_PX: f32 = 12.0;
const SECTION_GAP_PX: f32 = 24.0;
const IMAGE_MARGIN_PX: f32 = 16.0;
/// Used when the image cannot be decoded.
const FALLBACK_ASPECT: f32 = 3.0 / 4.0;

/// Style inputs that influence measured heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleContext {
    pub body_size_pt: u32,
    pub title_size_pt: u32,
    pub layout: Layout,
    pub image_size_percent: u8,
}

/// A unit the paginator places on a page.
#[derive(Debug, Clone, Copy)]
pub enum Block<'a> {
    Text {
        index: usize,
        heading: &'a str,
        body: &'a str,
    },
    Image {
        data: &'a ImageData,
    },
}

/// Returns the rendered height of a block in CSS pixels.
///
/// Implementations must be deterministic: the same block and style always
/// measure the same.
pub trait ContentMeasurer: Send + Sync {
    fn measure(&self, block: &Block<'_>, style: &StyleContext) -> f32;
}

pub fn pt_to_px(pt: u32) -> f32 {
    pt as f32 * 96.0 / 72.0
}

pub fn content_width_px(layout: Layout) -> f32 {
    PAGE_WIDTH_PX - 2.0 * layout.content_inset_px()
}

/// Default measurer based on font metrics and display width.
#[derive(Debug, Clone, Default)]
pub struct TextMetricsMeasurer {
    widths: TextWidthCalculator,
}

impl TextMetricsMeasurer {
    pub fn new() -> Self {
        Self::default()
    }

    fn text_height(&self, text: &str, font_px: f32, line_height: f32, width_px: f32) -> f32 {
        // a half-width column is roughly half the em size
        let columns = (width_px / (font_px * 0.5)).floor().max(1.0) as usize;
        let lines = self.widths.line_count(text, columns);
        lines as f32 * font_px * line_height
    }

    fn image_height(&self, data: &ImageData, style: &StyleContext) -> f32 {
        let width = content_width_px(style.layout) * style.image_size_percent as f32 / 100.0;
        let aspect = image_aspect(data).unwrap_or(FALLBACK_ASPECT);
        width * aspect + IMAGE_MARGIN_PX
    }
}

impl ContentMeasurer for TextMetricsMeasurer {
    fn measure(&self, block: &Block<'_>, style: &StyleContext) -> f32 {
        match block {
            Block::Text { heading, body, .. } => {
                let width = content_width_px(style.layout);
                let body_px = pt_to_px(style.body_size_pt);
                let heading_px = body_px * HEADING_SCALE;

                let mut height = SECTION_GAP_PX;
                if !heading.trim().is_empty() {
                    height += self.text_height(heading, heading_px, HEADING_LINE_HEIGHT, width)
                        + HEADING_GAP_PX;
                }
                let plain = markcore::plain_text(body);
                height + self.text_height(&plain, body_px, BODY_LINE_HEIGHT, width)
            }
            Block::Image { data } => self.image_height(data, style),
        }
    }
}

/// Height over width of the decoded image.
fn image_aspect(data: &ImageData) -> Option<f32> {
    let bytes = match data.decode() {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("Failed to decode image for measurement: {}", e);
            return None;
        }
    };
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok((w, h)) if w > 0 => Some(h as f32 / w as f32),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Failed to read image dimensions: {}", e);
            None
        }
    }
}
