//! The persisted/exported shape of a document and its conversion to and
//! from the in-memory [`Document`].
//!
//! Every field is optional when reading, so snapshots written by older
//! versions (or edited by hand) still load: missing values take their
//! documented defaults. Numeric fields accept numbers or numeric strings.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::issuers::IssuerSet;
use crate::model::{
    Document, HexColor, ImageData, Layout, Section, SectionKind, DEFAULT_ACCENT_COLOR,
    DEFAULT_BODY_SIZE_PT, DEFAULT_FONT_FAMILY, DEFAULT_IMAGE_SIZE_PERCENT, DEFAULT_PRIMARY_COLOR,
    DEFAULT_TITLE_SIZE_PT, DEFAULT_VOLUME,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub title_size: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub body_size: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_issuers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_page_number: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSnapshot {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientNumber>::deserialize(deserializer)?;
    let number = match value {
        Some(LenientNumber::Number(n)) => Some(n),
        Some(LenientNumber::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(LenientNumber::Other(_)) | None => None,
    };
    Ok(number
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32))
}

/// Empty strings count as missing, like blank form fields.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Document {
    /// Reads every field of the document into one snapshot.
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            title: Some(self.title.clone()),
            date: Some(
                self.issue_date
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default(),
            ),
            issuer: Some(self.issuer.clone()),
            vol: Some(self.volume.clone()),
            color: Some(self.primary_color.to_string()),
            color_accent: Some(self.accent_color.to_string()),
            font: Some(self.font_family.clone()),
            footer: Some(self.footer.clone()),
            title_size: Some(self.title_size_pt),
            body_size: Some(self.body_size_pt),
            image_size: Some(u32::from(self.image_size_percent)),
            sections: Some(
                self.sections
                    .iter()
                    .map(|s| SectionSnapshot {
                        kind: Some(s.kind.name().to_string()),
                        heading: Some(s.heading.clone()),
                        body: Some(s.body.clone()),
                    })
                    .collect(),
            ),
            custom_issuers: Some(self.issuers.custom().to_vec()),
            layout: Some(self.layout.name().to_string()),
            image_data: Some(
                self.image
                    .as_ref()
                    .map(|i| i.as_str().to_string())
                    .unwrap_or_default(),
            ),
            show_page_number: Some(self.show_page_number),
        }
    }

    /// Builds a document from a snapshot, rebuilding the section list from
    /// scratch and substituting defaults for anything missing or invalid.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let mut document = Document::blank();

        document.title = snapshot.title.unwrap_or_default();
        document.issue_date = non_empty(snapshot.date).and_then(|d| {
            NaiveDate::parse_from_str(d.trim(), DATE_FORMAT)
                .map_err(|e| log::warn!("Ignoring invalid issue date '{}': {}", d, e))
                .ok()
        });
        document.issuers = IssuerSet::from_custom(snapshot.custom_issuers.unwrap_or_default());
        if let Some(issuer) = non_empty(snapshot.issuer) {
            document.issuer = issuer;
        }
        document.volume = non_empty(snapshot.vol).unwrap_or_else(|| DEFAULT_VOLUME.to_string());
        document.primary_color = color_or_default(snapshot.color, DEFAULT_PRIMARY_COLOR);
        document.accent_color = color_or_default(snapshot.color_accent, DEFAULT_ACCENT_COLOR);
        document.font_family =
            non_empty(snapshot.font).unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
        document.footer = snapshot.footer.unwrap_or_default();
        document.title_size_pt = snapshot
            .title_size
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_TITLE_SIZE_PT);
        document.body_size_pt = snapshot
            .body_size
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_BODY_SIZE_PT);
        document.image_size_percent = snapshot
            .image_size
            .filter(|&s| s > 0)
            .map(|s| s.min(100) as u8)
            .unwrap_or(DEFAULT_IMAGE_SIZE_PERCENT);
        document.layout = snapshot
            .layout
            .as_deref()
            .and_then(Layout::from_name)
            .unwrap_or_default();
        document.image = non_empty(snapshot.image_data).and_then(|uri| {
            let image = ImageData::from_data_uri(&uri);
            if image.is_none() {
                log::warn!("Ignoring unsupported image data ({} bytes)", uri.len());
            }
            image
        });
        document.show_page_number = snapshot.show_page_number.unwrap_or(true);
        document.sections = snapshot
            .sections
            .unwrap_or_default()
            .into_iter()
            .map(|s| Section {
                kind: s
                    .kind
                    .as_deref()
                    .map(SectionKind::from_name)
                    .unwrap_or_default(),
                heading: s.heading.unwrap_or_default(),
                body: s.body.unwrap_or_default(),
            })
            .collect();

        document.normalize();
        document
    }
}

fn color_or_default(value: Option<String>, default: &str) -> HexColor {
    value
        .as_deref()
        .and_then(HexColor::parse)
        .unwrap_or_else(|| HexColor::fallback(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuers::default_issuer;
    use crate::templates::placeholder_section;

    fn sample_document() -> Document {
        let mut document = Document::blank();
        document.title = "夏祭りのお知らせ".to_string();
        document.issue_date = NaiveDate::from_ymd_opt(2026, 7, 1);
        document.issuer = "自治会".to_string();
        document.footer = "問い合わせ：事務局".to_string();
        document.layout = Layout::Modern;
        document.image_size_percent = 60;
        document.show_page_number = false;
        document.sections = vec![
            Section::text("日時", "**7月20日** 18時から\n雨天中止"),
            Section::page_break(),
            Section::text("持ち物", "うちわ 🎐"),
        ];
        document.normalize();
        document
    }

    #[test]
    fn test_round_trip_is_identity() {
        let document = sample_document();
        let restored = Document::from_snapshot(document.to_snapshot());
        assert_eq!(restored, document);
    }

    #[test]
    fn test_apply_current_state_is_idempotent() {
        let document = sample_document();
        let first = document.to_snapshot();
        let second = Document::from_snapshot(first.clone()).to_snapshot();
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = sample_document().to_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"colorAccent\":\"#FF5252\""));
        assert!(json.contains("\"type\":\"page-break\""));
        let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_empty_snapshot_uses_defaults() {
        let document = Document::from_snapshot(StateSnapshot::default());
        assert_eq!(document.title, "");
        assert_eq!(document.issue_date, None);
        assert_eq!(document.issuer, default_issuer());
        assert_eq!(document.volume, DEFAULT_VOLUME);
        assert_eq!(document.title_size_pt, 32);
        assert_eq!(document.body_size_pt, 11);
        assert_eq!(document.image_size_percent, 100);
        assert!(document.show_page_number);
        assert_eq!(document.layout, Layout::Standard);
        assert_eq!(document.sections, vec![placeholder_section()]);
    }

    #[test]
    fn test_zero_sections_inserts_one_placeholder() {
        let snapshot = StateSnapshot {
            sections: Some(Vec::new()),
            ..StateSnapshot::default()
        };
        let document = Document::from_snapshot(snapshot);
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0], placeholder_section());
    }

    #[test]
    fn test_legacy_string_sizes() {
        let json = r##"{
            "title": "旧形式",
            "titleSize": "40",
            "bodySize": "12",
            "imageSize": "150",
            "color": "#1976d2",
            "layout": "simple",
            "sections": [{"heading": "A", "body": "x"}]
        }"##;
        let snapshot: StateSnapshot = serde_json::from_str(json).unwrap();
        let document = Document::from_snapshot(snapshot);
        assert_eq!(document.title_size_pt, 40);
        assert_eq!(document.body_size_pt, 12);
        assert_eq!(document.image_size_percent, 100);
        assert_eq!(document.primary_color.as_str(), "#1976D2");
        assert_eq!(document.layout, Layout::Simple);
        assert_eq!(document.sections[0].kind, SectionKind::Text);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let json = r##"{
            "date": "not-a-date",
            "color": "crimson",
            "titleSize": 0,
            "bodySize": null,
            "imageSize": true,
            "layout": "poster",
            "imageData": "https://example.com/x.png"
        }"##;
        let document = Document::from_snapshot(serde_json::from_str(json).unwrap());
        assert_eq!(document.issue_date, None);
        assert_eq!(document.primary_color.as_str(), DEFAULT_PRIMARY_COLOR);
        assert_eq!(document.title_size_pt, 32);
        assert_eq!(document.body_size_pt, 11);
        assert_eq!(document.image_size_percent, 100);
        assert_eq!(document.layout, Layout::Standard);
        assert!(document.image.is_none());
    }

    #[test]
    fn test_unknown_issuer_joins_custom_set() {
        let snapshot = StateSnapshot {
            issuer: Some("生徒会".to_string()),
            custom_issuers: Some(vec!["PTA".to_string()]),
            ..StateSnapshot::default()
        };
        let document = Document::from_snapshot(snapshot);
        assert_eq!(document.issuer, "生徒会");
        assert_eq!(document.issuers.custom(), ["PTA".to_string(), "生徒会".to_string()]);
    }

    #[test]
    fn test_page_break_heading_is_normalized() {
        let json = r#"{"sections":[{"type":"page-break","heading":"改ページ","body":"x"}]}"#;
        let document = Document::from_snapshot(serde_json::from_str(json).unwrap());
        assert_eq!(document.sections, vec![Section::page_break()]);
    }
}
