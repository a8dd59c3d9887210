//! The portable key: the JSON snapshot as copy-paste-safe ASCII, for
//! moving a document between machines by hand.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::snapshot::StateSnapshot;

/// Keys this short cannot hold a snapshot and are rejected outright.
pub const MIN_KEY_LEN: usize = 10;

pub fn encode(snapshot: &StateSnapshot) -> Result<String> {
    let json = serde_json::to_string(snapshot).context("スナップショットのシリアライズに失敗しました")?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decodes a key produced by [`encode`]. Whitespace introduced by copy and
/// paste (line wraps, indentation) is ignored.
pub fn decode(key: &str) -> Result<StateSnapshot> {
    let compact: String = key.split_whitespace().collect();
    if compact.len() <= MIN_KEY_LEN {
        return Err(anyhow::anyhow!("識別キーが短すぎます"));
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .context("識別キーの形式が無効です")?;
    let json = String::from_utf8(bytes).context("識別キーの文字コードが無効です")?;
    serde_json::from_str(&json).context("識別キーの内容を読み取れませんでした")
}
