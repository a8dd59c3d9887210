use anyhow::Result;
use std::path::PathBuf;

use crate::session::{Confirm, Session};

const USAGE: &str = "\
使い方: keijiban <コマンド> [引数]

  preview [出力.html]        プレビューHTMLを出力
  pages                      ページ割りを表示
  title <タイトル>           タイトルを設定
  issuer <発行者>            発行者を追加して選択
  delete-issuer              選択中の発行者を削除
  add-section <見出し> [本文] 項目を追加
  page-break                 改ページを追加
  remove-section <番号>      項目を削除 (0始まり)
  image <ファイル>           画像を設定
  remove-image               画像を削除
  gradients                  保存済みの配色を表示
  save-gradient              現在の配色を保存
  export-json                JSONファイルに書き出し
  import <ファイル>          JSONファイルから読み込み
  key                        識別キーを表示
  import-key <キー>          識別キーから復元
  history                    履歴を表示
  save-history               現在の状態を履歴に保存
  load-history <ID>          履歴から読み込み
  delete-history <ID>        履歴を削除
  templates                  テンプレート一覧
  reset                      全ての入力をリセット";

/// Maps command-line words onto session operations. Returns the text to
/// print.
pub struct CommandProcessor;

impl CommandProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        args: &[String],
        session: &mut Session,
        confirm: &mut dyn Confirm,
    ) -> Result<String> {
        let parts: Vec<&str> = args.iter().map(String::as_str).collect();
        let Some((&command, rest)) = parts.split_first() else {
            return Ok(USAGE.to_string());
        };

        let output = match command {
            "preview" => {
                session.tick();
                let html = session.preview_html();
                match rest.first() {
                    Some(path) => {
                        let path = PathBuf::from(path);
                        crate::file_manager::write_atomic(&path, html.as_bytes()).await?;
                        format!("プレビューを書き出しました: {}", path.display())
                    }
                    None => html,
                }
            }
            "pages" => {
                session.tick();
                describe_pages(session)
            }
            "title" => {
                let title = rest.join(" ");
                session.edit(|d| d.title = title).await;
                format!("タイトルを設定しました: {}", session.document().title)
            }
            "issuer" => {
                let name = rest.join(" ");
                if session.add_issuer(&name).await {
                    format!("発行者を追加しました: {}", session.document().issuer)
                } else {
                    format!("発行者を選択しました: {}", session.document().issuer)
                }
            }
            "delete-issuer" => {
                if session.delete_selected_issuer().await {
                    "発行者を削除しました".to_string()
                } else {
                    "既定の発行者は削除できません".to_string()
                }
            }
            "add-section" => {
                let heading = argument(rest, 0, "見出し")?.to_string();
                let body = rest.get(1..).map(|b| b.join(" ")).unwrap_or_default();
                session.add_section().await;
                let index = session.document().sections.len() - 1;
                session.set_section_text(index, &heading, &body).await;
                format!("項目 {} を追加しました", index)
            }
            "page-break" => {
                session.add_page_break().await;
                "改ページを追加しました".to_string()
            }
            "remove-section" => {
                let index: usize = parse_argument(rest, 0, "項目番号")?;
                if session.remove_section(index).await {
                    format!("項目 {} を削除しました", index)
                } else {
                    return Err(anyhow::anyhow!("項目が見つかりません: {}", index));
                }
            }
            "image" => {
                let path = PathBuf::from(argument(rest, 0, "画像ファイル")?);
                session.set_image_file(&path).await?;
                format!("画像を設定しました: {}", path.display())
            }
            "remove-image" => {
                session.remove_image().await;
                "画像を削除しました".to_string()
            }
            "gradients" => session
                .gradients()
                .presets()
                .iter()
                .map(|preset| {
                    let marker = if session.is_active_gradient(preset) { "*" } else { " " };
                    format!("{} {} → {}", marker, preset.primary, preset.accent)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            "save-gradient" => {
                if session.save_gradient().await? {
                    "配色を保存しました".to_string()
                } else {
                    "同じ配色は保存済みです".to_string()
                }
            }
            "export-json" => {
                let path = session.export_json().await?;
                format!("書き出しました: {}", path.display())
            }
            "import" => {
                let path = PathBuf::from(argument(rest, 0, "ファイル")?);
                session.import_json_file(&path).await?;
                "データを読み込みました。".to_string()
            }
            "key" => session.export_key()?,
            "import-key" => {
                session.import_key(&rest.join("")).await?;
                "キーからデータを復元しました。".to_string()
            }
            "history" => {
                if session.history().is_empty() {
                    "履歴はありません".to_string()
                } else {
                    session
                        .history()
                        .entries()
                        .iter()
                        .map(|entry| format!("{}  {}  {}", entry.id, entry.saved_at, entry.title()))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "save-history" => {
                let id = session.save_to_history().await?;
                format!("現在の状態を履歴に保存しました。 (ID: {})", id)
            }
            "load-history" => {
                let id: i64 = parse_argument(rest, 0, "履歴ID")?;
                if session.load_history(id, confirm).await? {
                    "データを読み込みました。".to_string()
                } else {
                    "キャンセルしました".to_string()
                }
            }
            "delete-history" => {
                let id: i64 = parse_argument(rest, 0, "履歴ID")?;
                if session.delete_history(id, confirm).await? {
                    "履歴を削除しました".to_string()
                } else {
                    "キャンセルしました".to_string()
                }
            }
            "templates" => session
                .templates()
                .iter()
                .map(|t| format!("{}\t{}", t.name, t.label))
                .collect::<Vec<_>>()
                .join("\n"),
            "reset" => {
                if session.reset(confirm).await? {
                    "リセットしました".to_string()
                } else {
                    "キャンセルしました".to_string()
                }
            }
            "help" | "--help" | "-h" => USAGE.to_string(),
            other => return Err(anyhow::anyhow!("不明なコマンドです: {}\n\n{}", other, USAGE)),
        };

        Ok(output)
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_pages(session: &Session) -> String {
    let document = session.document();
    session
        .pagination()
        .pages
        .iter()
        .map(|page| {
            let mut line = format!("ページ {}/{}", page.number, page.total);
            if page.header_visible {
                line.push_str(" [ヘッダー]");
            }
            let headings: Vec<&str> = page
                .sections()
                .filter_map(|i| document.sections.get(i))
                .map(|s| s.heading.as_str())
                .collect();
            line.push_str(&format!(" 項目: {}", headings.join(", ")));
            if page.has_image() {
                line.push_str(" [画像]");
            }
            if page.ends_with_manual_break {
                line.push_str(" [改ページ]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn argument<'a>(rest: &[&'a str], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("引数が必要です: {}", name))
}

fn parse_argument<T: std::str::FromStr>(rest: &[&str], index: usize, name: &str) -> Result<T> {
    let raw = argument(rest, index, name)?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("{}が無効です: {}", name, raw))
}
