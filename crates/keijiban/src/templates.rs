//! Built-in document templates. Each one supplies the title and the
//! initial section list of a new document.

use crate::model::Section;

pub const DEFAULT_TEMPLATE: &str = "generic";

const PLACEHOLDER_HEADING: &str = "ここに項目を入力";
const PLACEHOLDER_BODY: &str = "本文を入力してください。";

/// The section a document falls back to when it would otherwise be empty.
pub fn placeholder_section() -> Section {
    Section::text(PLACEHOLDER_HEADING, PLACEHOLDER_BODY)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTemplate {
    pub name: String,
    pub label: String,
    pub title: String,
    pub sections: Vec<Section>,
}

impl DocumentTemplate {
    fn new(name: &str, label: &str, title: &str, sections: Vec<Section>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            title: title.to_string(),
            sections,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<DocumentTemplate>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let templates = vec![
            DocumentTemplate::new(DEFAULT_TEMPLATE, "汎用", "", vec![placeholder_section()]),
            DocumentTemplate::new(
                "notice",
                "お知らせ",
                "お知らせ",
                vec![
                    Section::text("概要", "ここにお知らせの概要を入力してください。"),
                    Section::text(
                        "日時・場所",
                        "**日時：** ○月○日（○）○時から\n**場所：** ○○会館",
                    ),
                    Section::text("お問い合わせ", "担当：○○\n電話：000-0000-0000"),
                ],
            ),
            DocumentTemplate::new(
                "minutes",
                "議事録",
                "議事録",
                vec![
                    Section::text("出席者", "○○、○○、○○"),
                    Section::text("議題", "1. ○○について\n2. ○○について"),
                    Section::text("決定事項", "**決定：** ○○"),
                    Section::page_break(),
                    Section::text("次回予定", "○月○日 ○時から"),
                ],
            ),
        ];
        Self { templates }
    }

    pub fn get(&self, name: &str) -> Option<&DocumentTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn default_template(&self) -> &DocumentTemplate {
        // builtin() always registers the generic template first
        &self.templates[0]
    }

    /// Looks a template up by name, falling back to the generic one.
    pub fn get_or_default(&self, name: &str) -> &DocumentTemplate {
        self.get(name).unwrap_or_else(|| {
            log::warn!("Unknown template '{}', using '{}'", name, DEFAULT_TEMPLATE);
            self.default_template()
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentTemplate> {
        self.templates.iter()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
