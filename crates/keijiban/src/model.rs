//! Document model: the editable flyer, its sections and the typed values
//! (colors, layouts, embedded image) it is made of.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::issuers::{default_issuer, IssuerSet};
use crate::measure::StyleContext;
use crate::templates::{placeholder_section, DocumentTemplate};

pub const DEFAULT_VOLUME: &str = "ID-001";
pub const DEFAULT_PRIMARY_COLOR: &str = "#D32F2F";
pub const DEFAULT_ACCENT_COLOR: &str = "#FF5252";
pub const DEFAULT_FONT_FAMILY: &str = "'Noto Sans JP', sans-serif";
pub const DEFAULT_TITLE_SIZE_PT: u32 = 32;
pub const DEFAULT_BODY_SIZE_PT: u32 = 11;
pub const DEFAULT_IMAGE_SIZE_PERCENT: u8 = 100;

/// Heading value stored for page-break markers.
pub const PAGE_BREAK_HEADING: &str = "[PAGE_BREAK]";

/// A `#RRGGBB` color. Always six upper-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Accepts `#rrggbb` or `rrggbb` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(format!("#{}", digits.to_ascii_uppercase())))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }

    pub(crate) fn fallback(default: &str) -> Self {
        Self(default.to_string())
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("無効なカラーコードです: {}", value))
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The named page layouts a document can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Standard,
    Modern,
    Simple,
}

impl Layout {
    pub const ALL: [Layout; 3] = [Layout::Standard, Layout::Modern, Layout::Simple];

    pub fn name(&self) -> &'static str {
        match self {
            Layout::Standard => "standard",
            Layout::Modern => "modern",
            Layout::Simple => "simple",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|layout| layout.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Horizontal padding of the page body on each side, in pixels.
    pub fn content_inset_px(&self) -> f32 {
        match self {
            Layout::Standard => 48.0,
            Layout::Modern => 64.0,
            Layout::Simple => 40.0,
        }
    }

    pub fn css_class(&self) -> String {
        format!("layout-{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionKind {
    #[default]
    Text,
    PageBreak,
}

impl SectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SectionKind::Text => "text",
            SectionKind::PageBreak => "page-break",
        }
    }

    /// Unknown kinds read as text.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "page-break" | "pageBreak" | "page_break" => SectionKind::PageBreak,
            _ => SectionKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: String,
    pub body: String,
}

impl Section {
    pub fn text(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: SectionKind::Text,
            heading: heading.into(),
            body: body.into(),
        }
    }

    pub fn page_break() -> Self {
        Self {
            kind: SectionKind::PageBreak,
            heading: PAGE_BREAK_HEADING.to_string(),
            body: String::new(),
        }
    }

    pub fn is_page_break(&self) -> bool {
        self.kind == SectionKind::PageBreak
    }

    /// Wraps the byte range `start..end` of the body in `**` and returns the
    /// range of the wrapped text afterwards.
    pub fn wrap_bold(&mut self, start: usize, end: usize) -> Result<(usize, usize)> {
        if self.is_page_break() {
            return Err(anyhow::anyhow!("改ページには太字を適用できません"));
        }
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if end > self.body.len()
            || !self.body.is_char_boundary(start)
            || !self.body.is_char_boundary(end)
        {
            return Err(anyhow::anyhow!("選択範囲が無効です: {}..{}", start, end));
        }

        let selected = &self.body[start..end];
        self.body = format!("{}**{}**{}", &self.body[..start], selected, &self.body[end..]);
        Ok((start + 2, end + 2))
    }

    fn normalize(&mut self) {
        if self.is_page_break() {
            self.heading = PAGE_BREAK_HEADING.to_string();
            self.body.clear();
        }
    }
}

/// An embedded image kept as a self-describing `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData(String);

impl ImageData {
    /// Accepts inline raster images only.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        markcore::sanitize::safe_image_src(uri.trim()).map(|src| Self(src.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes).context("画像形式を判別できませんでした")?;
        let mime = format.to_mime_type();
        let uri = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
        Self::from_data_uri(&uri)
            .ok_or_else(|| anyhow::anyhow!("対応していない画像形式です: {}", mime))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        let payload = self
            .0
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| anyhow::anyhow!("画像データが壊れています"))?;
        STANDARD
            .decode(payload)
            .context("画像データのデコードに失敗しました")
    }
}

/// The editable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub issue_date: Option<NaiveDate>,
    pub issuer: String,
    pub volume: String,
    pub primary_color: HexColor,
    pub accent_color: HexColor,
    pub font_family: String,
    pub footer: String,
    pub title_size_pt: u32,
    pub body_size_pt: u32,
    pub image_size_percent: u8,
    pub layout: Layout,
    pub show_page_number: bool,
    pub image: Option<ImageData>,
    pub sections: Vec<Section>,
    pub issuers: IssuerSet,
}

impl Document {
    /// A fresh document built from a template, dated `today`.
    pub fn from_template(template: &DocumentTemplate, today: NaiveDate) -> Self {
        let mut document = Self {
            title: template.title.clone(),
            issue_date: Some(today),
            sections: template.sections.clone(),
            ..Self::blank()
        };
        document.normalize();
        document
    }

    /// Every field at its default, no sections, no date.
    pub(crate) fn blank() -> Self {
        Self {
            title: String::new(),
            issue_date: None,
            issuer: default_issuer().to_string(),
            volume: DEFAULT_VOLUME.to_string(),
            primary_color: HexColor::fallback(DEFAULT_PRIMARY_COLOR),
            accent_color: HexColor::fallback(DEFAULT_ACCENT_COLOR),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            footer: String::new(),
            title_size_pt: DEFAULT_TITLE_SIZE_PT,
            body_size_pt: DEFAULT_BODY_SIZE_PT,
            image_size_percent: DEFAULT_IMAGE_SIZE_PERCENT,
            layout: Layout::default(),
            show_page_number: true,
            image: None,
            sections: Vec::new(),
            issuers: IssuerSet::default(),
        }
    }

    /// Restores the document invariants after an edit or import.
    ///
    /// The issuer always belongs to the issuer set (unknown names become
    /// custom issuers), sizes are in range, page breaks carry no text and
    /// the section list is never empty.
    pub fn normalize(&mut self) {
        if self.issuer.is_empty() {
            self.issuer = default_issuer().to_string();
        } else if !self.issuers.contains(&self.issuer) {
            self.issuers.add_if_new(&self.issuer);
        }

        if self.title_size_pt == 0 {
            self.title_size_pt = DEFAULT_TITLE_SIZE_PT;
        }
        if self.body_size_pt == 0 {
            self.body_size_pt = DEFAULT_BODY_SIZE_PT;
        }
        self.image_size_percent = self.image_size_percent.clamp(1, 100);

        for section in &mut self.sections {
            section.normalize();
        }
        if self.sections.is_empty() {
            self.sections.push(placeholder_section());
        }
    }

    pub fn style_context(&self) -> StyleContext {
        StyleContext {
            body_size_pt: self.body_size_pt,
            title_size_pt: self.title_size_pt,
            layout: self.layout,
            image_size_percent: self.image_size_percent,
        }
    }

    pub fn text_section_count(&self) -> usize {
        self.sections.iter().filter(|s| !s.is_page_break()).count()
    }
}
