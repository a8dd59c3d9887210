use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::try_exists;

use crate::export::{RasterOptions, DEFAULT_IMAGE_JPEG_QUALITY, DEFAULT_PDF_JPEG_QUALITY};
use crate::pagination::DEFAULT_PAGE_BUDGET_PX;
use crate::preview::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};
use crate::templates::{TemplateRegistry, DEFAULT_TEMPLATE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub export: ExportConfig,
    pub editor: EditorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Content height per page in CSS pixels.
    pub budget_px: f32,
    pub zoom: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub scale: f32,
    pub pdf_jpeg_quality: u8,
    pub image_jpeg_quality: u8,
    /// Where exports are written; the working directory when unset.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub default_template: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            budget_px: DEFAULT_PAGE_BUDGET_PX,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: RasterOptions::default().scale,
            pdf_jpeg_quality: DEFAULT_PDF_JPEG_QUALITY,
            image_jpeg_quality: DEFAULT_IMAGE_JPEG_QUALITY,
            output_dir: None,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Loads the config file, creating it with defaults when missing.
    /// A broken file is backed up to `.bak` and replaced by defaults.
    pub async fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path).await,
            None => {
                log::warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub async fn load_from(config_path: &Path) -> Result<Self> {
        if try_exists(config_path).await? {
            match tokio::fs::read_to_string(config_path).await {
                Ok(content) => {
                    if content.trim().is_empty() {
                        log::warn!("Config file is empty, creating new one");
                        return Ok(Self::write_default(config_path).await);
                    }

                    match serde_json::from_str::<Self>(&content) {
                        Ok(mut config) => {
                            config.validate()?;
                            log::info!(
                                "Successfully loaded config from: {}",
                                config_path.display()
                            );
                            return Ok(config);
                        }
                        Err(json_err) => {
                            log::error!("Failed to parse config file: {}", json_err);

                            let backup_path = config_path.with_extension("bak");
                            if let Err(e) = tokio::fs::copy(config_path, &backup_path).await {
                                log::warn!("Failed to backup broken config: {}", e);
                            } else {
                                log::info!(
                                    "Backed up broken config to: {}",
                                    backup_path.display()
                                );
                            }
                            return Ok(Self::write_default(config_path).await);
                        }
                    }
                }
                Err(io_err) => {
                    log::error!("Failed to read config file: {}", io_err);
                    return Ok(Self::default());
                }
            }
        }

        log::info!("Config file does not exist, creating default");
        Ok(Self::write_default(config_path).await)
    }

    async fn write_default(config_path: &Path) -> Self {
        let config = Self::default();
        if let Err(e) = config.save_to(config_path).await {
            log::warn!("Failed to write default config: {}", e);
        }
        config
    }

    pub async fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path).await,
            None => Ok(()),
        }
    }

    pub async fn save_to(&self, config_path: &Path) -> Result<()> {
        let mut config_to_save = self.clone();
        config_to_save.validate()?;

        if let Some(parent) = config_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Err(anyhow::anyhow!(
                    "設定ディレクトリの作成に失敗しました: {} - {}",
                    parent.display(),
                    e
                ));
            }
        }

        let content = serde_json::to_string_pretty(&config_to_save)
            .map_err(|e| anyhow::anyhow!("設定のシリアライズに失敗しました: {}", e))?;
        tokio::fs::write(config_path, content).await.map_err(|e| {
            anyhow::anyhow!(
                "設定ファイルの書き込みに失敗しました: {} - {}",
                config_path.display(),
                e
            )
        })?;
        log::info!("Successfully saved config to: {}", config_path.display());
        Ok(())
    }

    /// Replaces out-of-range values with defaults.
    pub fn validate(&mut self) -> Result<()> {
        let mut has_issues = false;

        if !(100.0..=5000.0).contains(&self.page.budget_px) {
            log::warn!("Invalid page budget: {}, using default", self.page.budget_px);
            self.page.budget_px = DEFAULT_PAGE_BUDGET_PX;
            has_issues = true;
        }

        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.page.zoom) {
            log::warn!("Invalid zoom: {}, using default", self.page.zoom);
            self.page.zoom = DEFAULT_ZOOM;
            has_issues = true;
        }

        if !(0.5..=4.0).contains(&self.export.scale) {
            log::warn!("Invalid export scale: {}, using default", self.export.scale);
            self.export.scale = RasterOptions::default().scale;
            has_issues = true;
        }

        if !(1..=100).contains(&self.export.pdf_jpeg_quality) {
            log::warn!(
                "Invalid PDF JPEG quality: {}, using default",
                self.export.pdf_jpeg_quality
            );
            self.export.pdf_jpeg_quality = DEFAULT_PDF_JPEG_QUALITY;
            has_issues = true;
        }

        if !(1..=100).contains(&self.export.image_jpeg_quality) {
            log::warn!(
                "Invalid image JPEG quality: {}, using default",
                self.export.image_jpeg_quality
            );
            self.export.image_jpeg_quality = DEFAULT_IMAGE_JPEG_QUALITY;
            has_issues = true;
        }

        if TemplateRegistry::builtin()
            .get(&self.editor.default_template)
            .is_none()
        {
            log::warn!(
                "Unknown default template: {}, using default",
                self.editor.default_template
            );
            self.editor.default_template = DEFAULT_TEMPLATE.to_string();
            has_issues = true;
        }

        if has_issues {
            log::info!("Configuration validation completed with corrections");
        }

        Ok(())
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            scale: self.export.scale,
            ..RasterOptions::default()
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KEIJIBAN_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("KEIJIBAN_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.json"));
        }

        ProjectDirs::from("com", "keijiban", "keijiban")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}
