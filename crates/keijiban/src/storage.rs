//! Local persistence: the current snapshot, saved history and gradient
//! presets, one JSON file per slot in the data directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::fs::try_exists;

use crate::file_manager::write_atomic;
use crate::gradients::{GradientPreset, GradientPresets};
use crate::history::{History, HistoryEntry};
use crate::snapshot::StateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    State,
    History,
    Gradients,
}

impl Slot {
    pub fn file_name(&self) -> &'static str {
        match self {
            Slot::State => "state.json",
            Slot::History => "history.json",
            Slot::Gradients => "gradients.json",
        }
    }
}

pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Uses `KEIJIBAN_DATA_DIR` when set, else the platform data directory.
    pub fn new() -> Result<Self> {
        Ok(Self::at(Self::default_data_dir()?))
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn default_data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("KEIJIBAN_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let dirs = directories::ProjectDirs::from("com", "keijiban", "keijiban")
            .ok_or_else(|| anyhow::anyhow!("プロジェクトディレクトリを特定できませんでした"))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        self.data_dir.join(slot.file_name())
    }

    pub async fn load_state(&self) -> Result<Option<StateSnapshot>> {
        self.read_slot(Slot::State).await
    }

    pub async fn save_state(&self, snapshot: &StateSnapshot) -> Result<()> {
        self.write_slot(Slot::State, snapshot).await
    }

    pub async fn clear_state(&self) -> Result<()> {
        self.clear_slot(Slot::State).await
    }

    pub async fn load_history(&self) -> Result<History> {
        let entries: Option<Vec<HistoryEntry>> = self.read_slot(Slot::History).await?;
        Ok(History::from_entries(entries.unwrap_or_default()))
    }

    pub async fn save_history(&self, history: &History) -> Result<()> {
        self.write_slot(Slot::History, history.entries()).await
    }

    /// `None` when no presets were ever saved.
    pub async fn load_gradients(&self) -> Result<Option<GradientPresets>> {
        let presets: Option<Vec<GradientPreset>> = self.read_slot(Slot::Gradients).await?;
        Ok(presets.map(GradientPresets::from_presets))
    }

    pub async fn save_gradients(&self, presets: &GradientPresets) -> Result<()> {
        self.write_slot(Slot::Gradients, presets).await
    }

    /// Missing slots read as `None`. A slot that fails to parse is moved
    /// aside to `<slot>.bak` and also reads as `None`.
    async fn read_slot<T: DeserializeOwned>(&self, slot: Slot) -> Result<Option<T>> {
        let path = self.slot_path(slot);
        if !try_exists(&path).await? {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("ファイル読み込みエラー: {}", path.display()))?;
        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let backup = path.with_extension("json.bak");
                log::warn!(
                    "Corrupt {} ({}), moving it to {}",
                    slot.file_name(),
                    e,
                    backup.display()
                );
                if let Err(e) = fs::rename(&path, &backup).await {
                    log::warn!("Failed to back up {}: {}", path.display(), e);
                }
                Ok(None)
            }
        }
    }

    async fn write_slot<T: Serialize + ?Sized>(&self, slot: Slot, value: &T) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await.with_context(|| {
            format!(
                "ディレクトリの作成に失敗しました: {}",
                self.data_dir.display()
            )
        })?;
        let json = serde_json::to_string_pretty(value)?;
        write_atomic(&self.slot_path(slot), json.as_bytes()).await?;
        log::debug!("Saved {}", slot.file_name());
        Ok(())
    }

    async fn clear_slot(&self, slot: Slot) -> Result<()> {
        let path = self.slot_path(slot);
        if try_exists(&path).await? {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("ファイルの削除に失敗しました: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HexColor;
    use chrono::Local;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn data_dir_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn titled(title: &str) -> StateSnapshot {
        StateSnapshot {
            title: Some(title.to_string()),
            ..StateSnapshot::default()
        }
    }

    #[test]
    fn test_data_dir_env_override() {
        let _guard = data_dir_lock().lock().unwrap();
        let dir = TempDir::new().unwrap();
        let previous = std::env::var("KEIJIBAN_DATA_DIR").ok();
        std::env::set_var("KEIJIBAN_DATA_DIR", dir.path());

        let store = Store::new().unwrap();
        assert_eq!(store.data_dir(), dir.path());

        match previous {
            Some(value) => std::env::set_var("KEIJIBAN_DATA_DIR", value),
            None => std::env::remove_var("KEIJIBAN_DATA_DIR"),
        }
    }

    #[tokio::test]
    async fn test_missing_slots_read_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path().join("never-created"));

        assert!(store.load_state().await.unwrap().is_none());
        assert!(store.load_history().await.unwrap().is_empty());
        assert!(store.load_gradients().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path());

        store.save_state(&titled("保存テスト")).await.unwrap();
        assert_eq!(store.load_state().await.unwrap(), Some(titled("保存テスト")));

        store.clear_state().await.unwrap();
        assert!(store.load_state().await.unwrap().is_none());
        // clearing twice is fine
        store.clear_state().await.unwrap();
    }

    #[tokio::test]
    async fn test_history_persists_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path());
        let mut history = History::default();
        history.push(titled("old"), Local::now());
        history.push(titled("new"), Local::now());

        store.save_history(&history).await.unwrap();
        let loaded = store.load_history().await.unwrap();

        assert_eq!(loaded, history);
        assert_eq!(loaded.entries()[0].title(), "new");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.slot_path(Slot::History)).unwrap())
                .unwrap();
        assert!(raw.is_array());
        assert!(raw[0]["savedAt"].is_string());
    }

    #[tokio::test]
    async fn test_gradients_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path());
        let mut presets = GradientPresets::builtin();
        presets.save(GradientPreset::new(
            HexColor::parse("#000000").unwrap(),
            HexColor::parse("#FFFFFF").unwrap(),
        ));

        store.save_gradients(&presets).await.unwrap();
        assert_eq!(store.load_gradients().await.unwrap(), Some(presets));
    }

    #[tokio::test]
    async fn test_corrupt_slot_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let store = Store::at(dir.path());
        std::fs::write(store.slot_path(Slot::State), "{ not json").unwrap();

        assert!(store.load_state().await.unwrap().is_none());
        assert!(!store.slot_path(Slot::State).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("state.json.bak")).unwrap(),
            "{ not json"
        );
    }
}
