use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::snapshot::StateSnapshot;

/// Snapshot files larger than this are refused on import.
pub const MAX_IMPORT_BYTES: u64 = 50 * 1024 * 1024; // 50MB

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Reads snapshot files and writes exported files into one output directory.
pub struct FileManager {
    output_dir: PathBuf,
}

impl FileManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reads and parses a JSON snapshot file. Nothing is applied here, so a
    /// failure leaves the caller's document untouched.
    pub async fn import_snapshot(&self, path: &Path) -> Result<StateSnapshot> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "ファイルが見つかりません: {}",
                path.display()
            ));
        }

        if !path.is_file() {
            return Err(anyhow::anyhow!(
                "指定されたパスはファイルではありません: {}",
                path.display()
            ));
        }

        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("ファイル情報の取得に失敗しました: {}", path.display()))?;
        if metadata.len() > MAX_IMPORT_BYTES {
            return Err(anyhow::anyhow!(
                "ファイルが大きすぎます ({} バイト): {}",
                metadata.len(),
                path.display()
            ));
        }

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                let error_msg = match e.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        format!("ファイルへのアクセス権限がありません: {}", path.display())
                    }
                    std::io::ErrorKind::InvalidData => {
                        format!("ファイルのエンコーディングが無効です (UTF-8ではありません): {}", path.display())
                    }
                    _ => format!("ファイル読み込みエラー: {} - {}", path.display(), e),
                };
                return Err(anyhow::anyhow!(error_msg));
            }
        };

        if content.contains('\0') {
            return Err(anyhow::anyhow!(
                "ファイルがバイナリ形式の可能性があります: {}",
                path.display()
            ));
        }

        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("JSONの解析に失敗しました: {}", path.display()))?;
        log::info!("Imported snapshot from {}", path.display());
        Ok(snapshot)
    }

    /// Writes the snapshot as `document_data_<millis>.json`.
    pub async fn export_snapshot(&self, snapshot: &StateSnapshot, millis: i64) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(snapshot)
            .context("スナップショットのシリアライズに失敗しました")?;
        self.write_export(&format!("document_data_{}.json", millis), json.as_bytes())
            .await
    }

    /// Writes a finished export, retrying transient failures. The file
    /// appears only once fully written.
    pub async fn write_export(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir).await.with_context(|| {
                format!(
                    "ディレクトリの作成に失敗しました: {}",
                    self.output_dir.display()
                )
            })?;
            log::info!("Created directory: {}", self.output_dir.display());
        }

        let path = self.output_dir.join(file_name);
        let mut attempts = 0;
        loop {
            match write_atomic(&path, bytes).await {
                Ok(()) => {
                    log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
                    return Ok(path);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_WRITE_ATTEMPTS {
                        return Err(e);
                    }
                    log::warn!(
                        "Write attempt {} failed for {}, retrying...",
                        attempts,
                        path.display()
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempts as u64))
                        .await;
                }
            }
        }
    }
}

/// Writes to a sibling temp file, then renames it over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("無効なファイル名です: {}", path.display()))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    if let Err(e) = fs::write(&temp_path, bytes).await {
        let error_msg = match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("ファイルへの書き込み権限がありません: {}", path.display())
            }
            std::io::ErrorKind::WriteZero => {
                format!("ディスク容量が不足している可能性があります: {}", path.display())
            }
            _ => format!("ファイル書き込みエラー: {} - {}", path.display(), e),
        };
        return Err(anyhow::anyhow!(error_msg));
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(anyhow::anyhow!(
            "ファイルの置き換えに失敗しました: {} - {}",
            path.display(),
            e
        ));
    }
    Ok(())
}

/// A file name stem derived from a document title, `document` when empty.
pub fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}
