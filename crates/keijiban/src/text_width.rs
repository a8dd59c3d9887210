//! 表示幅の計算モジュール
//!
//! 本文の行数見積もりに使う、東アジア文字を考慮した表示幅計算と
//! 折り返し処理を提供します。幅の単位は半角1文字分（カラム）です。

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// 表示幅の計算器
#[derive(Debug, Clone)]
pub struct TextWidthCalculator {
    /// 曖昧幅の文字を全角として扱うかどうか
    ambiguous_wide: bool,
}

impl Default for TextWidthCalculator {
    fn default() -> Self {
        Self {
            ambiguous_wide: false,
        }
    }
}

impl TextWidthCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 曖昧幅（〇、①、ギリシャ文字など）の扱いを設定
    pub fn ambiguous_wide(mut self, wide: bool) -> Self {
        self.ambiguous_wide = wide;
        self
    }

    /// 文字列の表示幅
    pub fn str_width(&self, text: &str) -> usize {
        text.graphemes(true).map(|g| self.grapheme_width(g)).sum()
    }

    /// グラフェムクラスタの表示幅
    pub fn grapheme_width(&self, grapheme: &str) -> usize {
        let mut chars = grapheme.chars();
        let Some(first) = chars.next() else {
            return 0;
        };

        if first.is_control() {
            return 0;
        }

        // 結合絵文字・国旗・異体字セレクタ付きは1つの全角文字として描画される
        if is_emoji(first) || grapheme.chars().any(is_emoji_modifier) {
            return 2;
        }

        let width = if self.ambiguous_wide {
            first.width_cjk()
        } else {
            first.width()
        };
        match width {
            Some(w) if w > 0 => w,
            _ if is_fullwidth_by_codepoint(first) => 2,
            Some(_) => 0,
            None => 1,
        }
    }

    /// `max_cols` カラムで折り返したときの行数
    ///
    /// 改行ごとに段落を分け、空の段落も1行として数えます。
    /// 行頭に収まらない幅広の文字は、その文字だけで1行を使います。
    pub fn line_count(&self, text: &str, max_cols: usize) -> usize {
        let max_cols = max_cols.max(1);
        text.split('\n')
            .map(|paragraph| self.paragraph_lines(paragraph, max_cols))
            .sum()
    }

    fn paragraph_lines(&self, paragraph: &str, max_cols: usize) -> usize {
        let mut lines = 1;
        let mut current = 0;
        for grapheme in paragraph.graphemes(true) {
            let width = self.grapheme_width(grapheme);
            if current + width > max_cols && current > 0 {
                lines += 1;
                current = 0;
            }
            current += width;
        }
        lines
    }
}

/// 文字列を指定カラム幅で折り返す
pub fn wrap_text(text: &str, max_cols: usize) -> Vec<String> {
    let calculator = TextWidthCalculator::new();
    let max_cols = max_cols.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut width = 0;
        for grapheme in paragraph.graphemes(true) {
            let w = calculator.grapheme_width(grapheme);
            if width + w > max_cols && width > 0 {
                lines.push(std::mem::take(&mut line));
                width = 0;
            }
            line.push_str(grapheme);
            width += w;
        }
        lines.push(line);
    }

    lines
}

fn is_emoji(c: char) -> bool {
    let code = c as u32;
    (0x1F300..=0x1F5FF).contains(&code) // Misc Symbols and Pictographs
        || (0x1F600..=0x1F64F).contains(&code) // Emoticons
        || (0x1F680..=0x1F6FF).contains(&code) // Transport and Map
        || (0x1F900..=0x1F9FF).contains(&code) // Supplemental Symbols
        || (0x1F1E6..=0x1F1FF).contains(&code) // Regional Indicators
}

fn is_emoji_modifier(c: char) -> bool {
    matches!(c, '\u{FE0F}' | '\u{200D}' | '\u{1F3FB}'..='\u{1F3FF}')
}

/// unicode-width が幅を返さない場合のフォールバック
fn is_fullwidth_by_codepoint(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code) // CJK統合漢字
        || (0x3400..=0x4DBF).contains(&code) // CJK統合漢字拡張A
        || (0x3040..=0x30FF).contains(&code) // ひらがな・カタカナ
        || (0xAC00..=0xD7AF).contains(&code) // ハングル音節
        || ((0xFF00..=0xFFEF).contains(&code) && !(0xFF61..=0xFF9F).contains(&code))
}
