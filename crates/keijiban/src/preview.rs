//! HTML preview of a paginated document, one fragment per page.

use chrono::{Datelike, NaiveDate};
use markcore::{escape_text, sanitize_markup, to_html};

use crate::model::Document;
use crate::pagination::{Page, PageItem, Pagination};

pub const DEFAULT_ZOOM: f32 = 0.8;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 2.0;

/// A finalized page handed to the rasterizer or shown in the preview.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub number: usize,
    pub total: usize,
    pub header_visible: bool,
    pub html: String,
}

/// `2026-04-01` is shown as `2026年4月1日`.
pub fn format_issue_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("{}年{}月{}日", date.year(), date.month(), date.day()),
        None => String::new(),
    }
}

pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_nan() {
        return DEFAULT_ZOOM;
    }
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    zoom: f32,
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self { zoom: DEFAULT_ZOOM }
    }
}

impl PreviewRenderer {
    pub fn new(zoom: f32) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Returns the applied (clamped) zoom.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = clamp_zoom(zoom);
        self.zoom
    }

    pub fn render(&self, document: &Document, pagination: &Pagination) -> Vec<RenderedPage> {
        pagination
            .pages
            .iter()
            .map(|page| RenderedPage {
                number: page.number,
                total: page.total,
                header_visible: page.header_visible,
                html: self.render_page(document, page),
            })
            .collect()
    }

    /// All pages as one standalone HTML document.
    pub fn render_document_html(&self, document: &Document, pages: &[RenderedPage]) -> String {
        let title = if document.title.is_empty() {
            "document"
        } else {
            document.title.as_str()
        };
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_text(title)));
        html.push_str("</head>\n<body>\n<div class=\"paper-container\">\n");
        for page in pages {
            html.push_str(&page.html);
            html.push('\n');
        }
        html.push_str("</div>\n</body>\n</html>\n");
        html
    }

    fn render_page(&self, document: &Document, page: &Page) -> String {
        let mut body = String::new();
        for item in &page.items {
            match item {
                PageItem::Section(index) => {
                    if let Some(section) = document.sections.get(*index) {
                        body.push_str(&format!(
                            concat!(
                                "<div class=\"preview-section\">",
                                "<div class=\"main-heading-container\"><h2 class=\"main-heading\">{}</h2></div>",
                                "<div class=\"text-content\" style=\"font-size: {}pt; line-height: 1.8;\"><p>{}</p></div>",
                                "</div>"
                            ),
                            escape_text(&section.heading),
                            document.body_size_pt,
                            sanitize_markup(&to_html(&section.body)),
                        ));
                    }
                }
                PageItem::Image => {
                    if let Some(image) = &document.image {
                        body.push_str(&format!(
                            concat!(
                                "<div class=\"content-wrapper\"><div class=\"image-container\">",
                                "<img src=\"{src}\" style=\"width: {pct}%; max-width: {pct}%\">",
                                "</div></div>"
                            ),
                            src = escape_text(image.as_str()),
                            pct = document.image_size_percent,
                        ));
                    }
                }
            }
        }
        if page.ends_with_manual_break {
            body.push_str("<div class=\"manual-page-break-preview\"></div>");
        }

        format!(
            concat!(
                "<div class=\"paper a4 {layout}\" style=\"--paper-primary: {primary}; --paper-accent: {accent}; ",
                "font-family: {font}; transform: scale({zoom});\">",
                "<header class=\"paper-header\" style=\"display: {header_display}\">",
                "<div class=\"header-decoration\"></div>",
                "<div class=\"header-content\">",
                "<div class=\"issue-info\"><span class=\"issue-date\">{date}</span><span class=\"issue-vol\">{volume}</span></div>",
                "<h1 class=\"paper-title\" style=\"font-size: {title_size}pt\">{title}</h1>",
                "<div class=\"issuer\">{issuer}</div>",
                "</div></header>",
                "<div class=\"paper-body\"><div class=\"page-sections\">{body}</div></div>",
                "<footer class=\"paper-footer\"><div class=\"footer-line\"></div>",
                "<p class=\"footer-text\">{footer}</p>",
                "<div class=\"page-number-preview\" style=\"display: {number_display}\">",
                "{number} / <span class=\"total-pages\">{total}</span></div>",
                "</footer></div>"
            ),
            layout = document.layout.css_class(),
            primary = document.primary_color,
            accent = document.accent_color,
            font = escape_text(&document.font_family),
            zoom = self.zoom,
            header_display = display(page.header_visible),
            date = format_issue_date(document.issue_date),
            volume = escape_text(&document.volume),
            title_size = document.title_size_pt,
            title = escape_text(&document.title),
            issuer = escape_text(&document.issuer),
            body = body,
            footer = escape_text(&document.footer),
            number_display = display(document.show_page_number),
            number = page.number,
            total = page.total,
        )
    }
}

fn display(visible: bool) -> &'static str {
    if visible {
        "block"
    } else {
        "none"
    }
}
