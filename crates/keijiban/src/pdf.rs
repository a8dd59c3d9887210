//! One A4 page per JPEG image, scaled to fill the page.

use anyhow::Result;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};

/// A4 in PDF points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

const IMAGE_NAME: &[u8] = b"Im1";

struct JpegPage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

#[derive(Default)]
pub struct PdfWriter {
    pages: Vec<JpegPage>,
}

impl PdfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page showing a baseline JPEG of `width` x `height` pixels.
    pub fn add_jpeg_page(&mut self, data: Vec<u8>, width: u32, height: u32) {
        self.pages.push(JpegPage {
            data,
            width,
            height,
        });
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(anyhow::anyhow!("PDFに出力するページがありません"));
        }

        let mut next_id = 1;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };

        let catalog_id = alloc();
        let pages_id = alloc();
        let mut pdf = Pdf::new();
        let mut page_ids = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let image_id = alloc();
            let content_id = alloc();
            let page_id = alloc();
            page_ids.push(page_id);

            {
                let mut image = pdf.image_xobject(image_id, &page.data);
                image.filter(Filter::DctDecode);
                image.width(page.width as i32);
                image.height(page.height as i32);
                image.color_space().device_rgb();
                image.bits_per_component(8);
            }

            let mut content = Content::new();
            content.save_state();
            content.transform([A4_WIDTH_PT, 0.0, 0.0, A4_HEIGHT_PT, 0.0, 0.0]);
            content.x_object(Name(IMAGE_NAME));
            content.restore_state();
            let content = content.finish();
            pdf.stream(content_id, &content);

            let mut pdf_page = pdf.page(page_id);
            pdf_page
                .media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT))
                .parent(pages_id)
                .contents(content_id);
            let mut resources = pdf_page.resources();
            resources.x_objects().pair(Name(IMAGE_NAME), image_id);
        }

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        Ok(pdf.finish())
    }
}
