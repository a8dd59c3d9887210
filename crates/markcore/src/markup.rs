use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::sanitize::escape_text;

lazy_static! {
    // `.` stops at newlines, so a bold span never crosses a line break.
    static ref BOLD_SPAN: Regex = Regex::new(r"\*\*(.*?)\*\*")
        .expect("Invalid BOLD_SPAN regex pattern");
}

/// One piece of renderable section body content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "camelCase")]
pub enum Inline {
    Text(String),
    Bold(String),
    LineBreak,
}

/// Splits a section body into text, bold spans and line breaks.
///
/// `**text**` becomes bold (non-greedy, no nesting), then every `\n`
/// becomes a line break. Unmatched asterisks are kept as literal text.
pub fn parse(body: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();

    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            inlines.push(Inline::LineBreak);
        }
        push_line(line, &mut inlines);
    }

    inlines
}

fn push_line(line: &str, inlines: &mut Vec<Inline>) {
    let mut last = 0;

    for caps in BOLD_SPAN.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            inlines.push(Inline::Text(line[last..whole.start()].to_string()));
        }
        inlines.push(Inline::Bold(inner.as_str().to_string()));
        last = whole.end();
    }

    if last < line.len() {
        inlines.push(Inline::Text(line[last..].to_string()));
    }
}

/// Renders a section body to an HTML fragment using `<b>` and `<br>` only.
/// All user text is escaped.
pub fn to_html(body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 16);

    for inline in parse(body) {
        match inline {
            Inline::Text(text) => html.push_str(&escape_text(&text)),
            Inline::Bold(text) => {
                html.push_str("<b>");
                html.push_str(&escape_text(&text));
                html.push_str("</b>");
            }
            Inline::LineBreak => html.push_str("<br>"),
        }
    }

    html
}

/// The body as it reads on the page: bold markers removed, newlines kept.
pub fn plain_text(body: &str) -> String {
    parse(body)
        .into_iter()
        .map(|inline| match inline {
            Inline::Text(text) | Inline::Bold(text) => text,
            Inline::LineBreak => "\n".to_string(),
        })
        .collect()
}
