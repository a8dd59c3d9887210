//! The editing session: owns the document and everything that reacts to it.
//!
//! Every mutation goes through [`Session::edit`] (or an operation built on
//! it), which normalizes the document, schedules a repagination for the
//! next [`Session::tick`] and writes the snapshot through to the store.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::export::{
    ExportOutcome, Exporter, PageRasterizer, ProgressUpdate, RasterFormat, RasterOptions,
};
use crate::file_manager::FileManager;
use crate::gradients::{GradientPreset, GradientPresets};
use crate::history::History;
use crate::measure::{ContentMeasurer, TextMetricsMeasurer};
use crate::model::{Document, ImageData, Section};
use crate::notices::StatusManager;
use crate::pagination::{Pagination, Paginator};
use crate::portable_key;
use crate::preview::{PreviewRenderer, RenderedPage};
use crate::scheduler::{Task, UpdateScheduler};
use crate::snapshot::StateSnapshot;
use crate::storage::Store;
use crate::templates::TemplateRegistry;

pub const CONFIRM_RESET: &str = "全ての入力をリセットしますか？";
pub const CONFIRM_LOAD_HISTORY: &str = "読み込みますか？";
pub const CONFIRM_DELETE_HISTORY: &str = "削除しますか？";

const NOTICE_KEY_COPIED: &str =
    "データを「識別キー」としてコピーしました。他の端末で「読み込み」からペーストして復元できます。";
const NOTICE_KEY_RESTORED: &str = "キーからデータを復元しました。";
const NOTICE_KEY_INVALID: &str = "無効なキーです。";
const NOTICE_DATA_LOADED: &str = "データを読み込みました。";
const NOTICE_FILE_FAILED: &str = "ファイルの読み込みに失敗しました。";
const NOTICE_HISTORY_SAVED: &str = "現在の状態を履歴に保存しました。";
const NOTICE_IMAGE_DROPPED: &str = "対応していない形式の画像のため、画像を読み込みませんでした。";

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub budget_px: f32,
    pub zoom: f32,
    pub default_template: String,
    pub raster: RasterOptions,
    pub pdf_jpeg_quality: u8,
    pub image_jpeg_quality: u8,
    pub output_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget_px: config.page.budget_px,
            zoom: config.page.zoom,
            default_template: config.editor.default_template.clone(),
            raster: config.raster_options(),
            pdf_jpeg_quality: config.export.pdf_jpeg_quality,
            image_jpeg_quality: config.export.image_jpeg_quality,
            output_dir: config.output_dir(),
        }
    }
}

pub struct Session {
    document: Document,
    gradients: GradientPresets,
    history: History,
    store: Store,
    files: FileManager,
    templates: TemplateRegistry,
    measurer: Box<dyn ContentMeasurer>,
    scheduler: UpdateScheduler,
    renderer: PreviewRenderer,
    exporter: Exporter,
    notices: StatusManager,
    budget_px: f32,
    default_template: String,
    pagination: Pagination,
    preview: Vec<RenderedPage>,
}

impl Session {
    /// Restores the last session from `store`, or starts from the default
    /// template when nothing was saved. Unreadable slots fall back to
    /// defaults.
    pub async fn open(store: Store, options: SessionOptions) -> Self {
        let templates = TemplateRegistry::builtin();

        let gradients = match store.load_gradients().await {
            Ok(Some(presets)) => presets,
            Ok(None) => GradientPresets::builtin(),
            Err(e) => {
                log::warn!("Failed to load gradient presets: {}", e);
                GradientPresets::builtin()
            }
        };

        let history = store.load_history().await.unwrap_or_else(|e| {
            log::warn!("Failed to load history: {}", e);
            History::default()
        });

        let document = match store.load_state().await {
            Ok(Some(snapshot)) => {
                log::info!("Restored document from {}", store.data_dir().display());
                Document::from_snapshot(snapshot)
            }
            Ok(None) => Self::fresh_document(&templates, &options.default_template),
            Err(e) => {
                log::warn!("Failed to load saved document: {}", e);
                Self::fresh_document(&templates, &options.default_template)
            }
        };

        let mut session = Self {
            document,
            gradients,
            history,
            store,
            files: FileManager::new(options.output_dir),
            templates,
            measurer: Box::new(TextMetricsMeasurer::new()),
            scheduler: UpdateScheduler::new(),
            renderer: PreviewRenderer::new(options.zoom),
            exporter: Exporter::new(
                options.raster,
                options.pdf_jpeg_quality,
                options.image_jpeg_quality,
            ),
            notices: StatusManager::new(),
            budget_px: options.budget_px,
            default_template: options.default_template,
            pagination: Pagination::default(),
            preview: Vec::new(),
        };
        session.scheduler.request();
        session.tick();
        session
    }

    /// Swaps the height estimator, e.g. for one backed by a real layout
    /// engine. Repaginates on the next tick.
    pub fn with_measurer(mut self, measurer: Box<dyn ContentMeasurer>) -> Self {
        self.measurer = measurer;
        self.scheduler.request();
        self
    }

    fn fresh_document(templates: &TemplateRegistry, template: &str) -> Document {
        Document::from_template(templates.get_or_default(template), today())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn notices(&self) -> &StatusManager {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut StatusManager {
        &mut self.notices
    }

    /// Applies `f` to the document and commits the result.
    pub async fn edit<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Document),
    {
        f(&mut self.document);
        self.commit().await;
    }

    async fn commit(&mut self) {
        self.document.normalize();
        self.scheduler.request();
        if let Err(e) = self.store.save_state(&self.document.to_snapshot()).await {
            log::error!("Failed to save document state: {:#}", e);
            self.notices.warning(format!("自動保存に失敗しました: {}", e));
        }
    }

    pub fn current_state(&self) -> StateSnapshot {
        self.document.to_snapshot()
    }

    /// Replaces the whole document with `snapshot`.
    pub async fn apply_state(&mut self, snapshot: StateSnapshot) {
        let had_image = snapshot
            .image_data
            .as_deref()
            .is_some_and(|uri| !uri.is_empty());
        self.document = Document::from_snapshot(snapshot);
        if had_image && self.document.image.is_none() {
            self.notices.warning(NOTICE_IMAGE_DROPPED);
        }
        self.commit().await;
    }

    /// Runs the pending repagination, if any. Returns whether it ran.
    pub fn tick(&mut self) -> bool {
        match self.scheduler.take() {
            Some(Task::Repaginate) => {
                self.pagination =
                    Paginator::new(&*self.measurer, self.budget_px).paginate(&self.document);
                self.preview = self.renderer.render(&self.document, &self.pagination);
                true
            }
            None => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn repagination_count(&self) -> u64 {
        self.scheduler.runs()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn preview(&self) -> &[RenderedPage] {
        &self.preview
    }

    /// The preview as one standalone HTML page.
    pub fn preview_html(&self) -> String {
        self.renderer
            .render_document_html(&self.document, &self.preview)
    }

    pub fn zoom(&self) -> f32 {
        self.renderer.zoom()
    }

    /// Zoom only changes the preview transform, not the page layout.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let applied = self.renderer.set_zoom(zoom);
        self.preview = self.renderer.render(&self.document, &self.pagination);
        applied
    }

    // issuers

    pub async fn select_issuer(&mut self, issuer: &str) {
        let issuer = issuer.to_string();
        self.edit(|d| d.issuer = issuer).await;
    }

    /// Adds `name` as a custom issuer and selects it. Empty input selects
    /// the default issuer. Returns whether a new issuer was added.
    pub async fn add_issuer(&mut self, name: &str) -> bool {
        let name = name.trim().to_string();
        let added = self.document.issuers.add_if_new(&name);
        self.edit(|d| d.issuer = name).await;
        added
    }

    /// Deletes the selected issuer when it is a custom one and falls back
    /// to the default issuer.
    pub async fn delete_selected_issuer(&mut self) -> bool {
        let selected = self.document.issuer.clone();
        if !self.document.issuers.is_custom(&selected) {
            return false;
        }
        self.edit(|d| {
            d.issuers.remove(&selected);
            d.issuer.clear();
        })
        .await;
        true
    }

    /// Whether the delete-issuer affordance should be shown.
    pub fn issuer_is_custom(&self) -> bool {
        self.document.issuers.is_custom(&self.document.issuer)
    }

    // gradients

    pub fn gradients(&self) -> &GradientPresets {
        &self.gradients
    }

    pub fn is_active_gradient(&self, preset: &GradientPreset) -> bool {
        GradientPresets::is_active(
            preset,
            &self.document.primary_color,
            &self.document.accent_color,
        )
    }

    /// Saves the current color pair as a preset. Returns `false` when the
    /// pair was already saved.
    pub async fn save_gradient(&mut self) -> Result<bool> {
        let preset = GradientPreset::new(
            self.document.primary_color.clone(),
            self.document.accent_color.clone(),
        );
        if !self.gradients.save(preset) {
            return Ok(false);
        }
        self.store.save_gradients(&self.gradients).await?;
        Ok(true)
    }

    pub async fn remove_gradient(&mut self, preset: &GradientPreset) -> Result<usize> {
        let removed = self.gradients.remove(preset);
        if removed > 0 {
            self.store.save_gradients(&self.gradients).await?;
        }
        Ok(removed)
    }

    pub async fn apply_gradient(&mut self, preset: &GradientPreset) {
        let preset = preset.clone();
        self.edit(|d| {
            d.primary_color = preset.primary;
            d.accent_color = preset.accent;
        })
        .await;
    }

    // sections

    pub async fn add_section(&mut self) {
        self.edit(|d| d.sections.push(Section::text("", ""))).await;
    }

    pub async fn add_page_break(&mut self) {
        self.edit(|d| d.sections.push(Section::page_break())).await;
    }

    pub async fn set_section_text(&mut self, index: usize, heading: &str, body: &str) -> bool {
        match self.document.sections.get(index) {
            Some(section) if !section.is_page_break() => {}
            _ => return false,
        }
        let (heading, body) = (heading.to_string(), body.to_string());
        self.edit(|d| {
            d.sections[index].heading = heading;
            d.sections[index].body = body;
        })
        .await;
        true
    }

    pub async fn remove_section(&mut self, index: usize) -> bool {
        if index >= self.document.sections.len() {
            return false;
        }
        self.edit(|d| {
            d.sections.remove(index);
        })
        .await;
        true
    }

    /// Wraps the byte range `start..end` of a section body in `**`.
    /// Returns the new selection, shifted past the opening marker.
    pub async fn wrap_bold(&mut self, index: usize, start: usize, end: usize) -> Result<(usize, usize)> {
        let section = self
            .document
            .sections
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("項目が見つかりません: {}", index))?;
        let selection = section.wrap_bold(start, end)?;
        self.commit().await;
        Ok(selection)
    }

    // image

    pub async fn set_image(&mut self, bytes: &[u8]) -> Result<()> {
        let image = ImageData::from_bytes(bytes)?;
        self.edit(|d| d.image = Some(image)).await;
        Ok(())
    }

    pub async fn set_image_file(&mut self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("画像の読み込みに失敗しました: {} - {}", path.display(), e))?;
        self.set_image(&bytes).await
    }

    pub async fn remove_image(&mut self) {
        self.edit(|d| d.image = None).await;
    }

    // history

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Returns the id of the new entry. Nothing changes when the history
    /// cannot be written.
    pub async fn save_to_history(&mut self) -> Result<i64> {
        let mut history = self.history.clone();
        let id = history.push(self.current_state(), Local::now()).id;
        self.store.save_history(&history).await?;
        self.history = history;
        self.notices.success(NOTICE_HISTORY_SAVED);
        Ok(id)
    }

    /// Replaces the document with a history entry once confirmed.
    /// Returns `false` when the user declined.
    pub async fn load_history(&mut self, id: i64, confirm: &mut dyn Confirm) -> Result<bool> {
        let state = self
            .history
            .get(id)
            .map(|entry| entry.state.clone())
            .ok_or_else(|| anyhow::anyhow!("履歴が見つかりません: {}", id))?;
        if !confirm.confirm(CONFIRM_LOAD_HISTORY) {
            return Ok(false);
        }
        self.apply_state(state).await;
        self.notices.success(NOTICE_DATA_LOADED);
        Ok(true)
    }

    pub async fn delete_history(&mut self, id: i64, confirm: &mut dyn Confirm) -> Result<bool> {
        if self.history.get(id).is_none() {
            return Err(anyhow::anyhow!("履歴が見つかりません: {}", id));
        }
        if !confirm.confirm(CONFIRM_DELETE_HISTORY) {
            return Ok(false);
        }
        let mut history = self.history.clone();
        history.remove(id);
        self.store.save_history(&history).await?;
        self.history = history;
        Ok(true)
    }

    // transfer

    pub fn export_key(&mut self) -> Result<String> {
        let key = portable_key::encode(&self.current_state())?;
        self.notices.info(NOTICE_KEY_COPIED);
        Ok(key)
    }

    /// Restores the document from a portable key. An invalid key raises a
    /// blocking notice and leaves the document as it was.
    pub async fn import_key(&mut self, key: &str) -> Result<()> {
        match portable_key::decode(key) {
            Ok(snapshot) => {
                self.apply_state(snapshot).await;
                self.notices.success(NOTICE_KEY_RESTORED);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected portable key: {:#}", e);
                self.notices.error(NOTICE_KEY_INVALID);
                Err(e)
            }
        }
    }

    pub async fn export_json(&self) -> Result<PathBuf> {
        self.files
            .export_snapshot(&self.current_state(), Local::now().timestamp_millis())
            .await
    }

    pub async fn import_json_file(&mut self, path: &Path) -> Result<()> {
        match self.files.import_snapshot(path).await {
            Ok(snapshot) => {
                self.apply_state(snapshot).await;
                self.notices.success(NOTICE_DATA_LOADED);
                Ok(())
            }
            Err(e) => {
                log::warn!("Import failed: {:#}", e);
                self.notices.error(NOTICE_FILE_FAILED);
                Err(e)
            }
        }
    }

    /// Discards the saved document and starts over from the default
    /// template. History and gradient presets are kept.
    pub async fn reset(&mut self, confirm: &mut dyn Confirm) -> Result<bool> {
        if !confirm.confirm(CONFIRM_RESET) {
            return Ok(false);
        }
        self.store.clear_state().await?;
        self.document = Self::fresh_document(&self.templates, &self.default_template);
        self.scheduler.request();
        log::info!("Document reset to template '{}'", self.default_template);
        Ok(true)
    }

    // export

    pub fn export_busy(&self) -> bool {
        self.exporter.is_busy()
    }

    pub fn export_progress(&self) -> tokio::sync::watch::Receiver<ProgressUpdate> {
        self.exporter.subscribe()
    }

    /// Pages as the rasterizer sees them: current layout, unzoomed.
    fn export_pages(&mut self) -> Vec<RenderedPage> {
        self.tick();
        PreviewRenderer::new(1.0).render(&self.document, &self.pagination)
    }

    pub async fn export_pdf(&mut self, rasterizer: &dyn PageRasterizer) -> Result<ExportOutcome> {
        let pages = self.export_pages();
        let result = self
            .exporter
            .export_pdf(rasterizer, &pages, &self.document.title, &self.files)
            .await;
        self.report_export(&result);
        result
    }

    pub async fn export_image(
        &mut self,
        rasterizer: &dyn PageRasterizer,
        format: RasterFormat,
    ) -> Result<ExportOutcome> {
        let pages = self.export_pages();
        let result = self
            .exporter
            .export_image(rasterizer, &pages, &self.document.title, format, &self.files)
            .await;
        self.report_export(&result);
        result
    }

    fn report_export(&mut self, result: &Result<ExportOutcome>) {
        match result {
            Ok(outcome) => {
                if let Some(warning) = &outcome.warning {
                    self.notices.warning(warning.clone());
                }
                self.notices
                    .success(format!("{} に出力しました", outcome.path.display()));
            }
            Err(e) => self.notices.error(format!("エクスポートに失敗しました: {}", e)),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::RasterOptions;
    use crate::measure::{Block, StyleContext};
    use crate::model::HexColor;
    use crate::notices::NoticeKind;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    /// One pixel of height per body character.
    struct CharMeasurer;

    impl ContentMeasurer for CharMeasurer {
        fn measure(&self, block: &Block<'_>, _style: &StyleContext) -> f32 {
            match block {
                Block::Text { body, .. } => body.chars().count() as f32,
                Block::Image { .. } => 100.0,
            }
        }
    }

    struct WhiteRasterizer {
        fail: bool,
    }

    #[async_trait]
    impl PageRasterizer for WhiteRasterizer {
        async fn rasterize(&self, _page: &RenderedPage, options: &RasterOptions) -> Result<RgbaImage> {
            if self.fail {
                return Err(anyhow::anyhow!("rasterizer crashed"));
            }
            let (w, h) = options.pixel_size();
            Ok(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
        }
    }

    fn options(dir: &TempDir) -> SessionOptions {
        SessionOptions {
            output_dir: dir.path().join("exports"),
            raster: RasterOptions {
                scale: 1.0,
                width_px: 30.0,
                height_px: 42.0,
            },
            ..SessionOptions::default()
        }
    }

    async fn open(dir: &TempDir) -> Session {
        Session::open(Store::at(dir.path().join("data")), options(dir))
            .await
            .with_measurer(Box::new(CharMeasurer))
    }

    fn always(answer: bool) -> impl FnMut(&str) -> bool {
        move |_| answer
    }

    #[tokio::test]
    async fn test_open_empty_store_uses_template() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.tick();

        let document = session.document();
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].heading, "ここに項目を入力");
        assert!(document.issue_date.is_some());
        assert_eq!(session.pagination().len(), 1);
        assert_eq!(session.preview().len(), 1);
        assert!(!dir.path().join("data").join("state.json").exists());
    }

    #[tokio::test]
    async fn test_edit_writes_through_and_restores() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = open(&dir).await;
            session.edit(|d| d.title = "夏祭りのお知らせ".to_string()).await;
        }

        let session = open(&dir).await;
        assert_eq!(session.document().title, "夏祭りのお知らせ");
    }

    #[tokio::test]
    async fn test_edits_coalesce_into_one_repagination() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.tick();
        let before = session.repagination_count();

        for i in 0..5 {
            session.edit(|d| d.title = format!("title {}", i)).await;
        }
        assert!(session.is_dirty());

        assert!(session.tick());
        assert!(!session.tick());
        assert_eq!(session.repagination_count(), before + 1);
        assert!(session.preview()[0].html.contains("title&#32;4"));
    }

    #[tokio::test]
    async fn test_apply_state_with_no_sections_inserts_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        session
            .apply_state(StateSnapshot {
                sections: Some(Vec::new()),
                ..StateSnapshot::default()
            })
            .await;

        assert_eq!(session.document().sections.len(), 1);
        assert_eq!(session.document().text_section_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_current_state_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.add_page_break().await;
        session.add_issuer("自治会").await;

        let state = session.current_state();
        session.apply_state(state.clone()).await;
        assert_eq!(session.current_state(), state);
    }

    #[tokio::test]
    async fn test_issuer_operations() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        assert!(!session.issuer_is_custom());

        assert!(session.add_issuer("  町内会  ").await);
        assert_eq!(session.document().issuer, "町内会");
        assert!(session.issuer_is_custom());
        assert!(!session.add_issuer("町内会").await);

        session.select_issuer("ここに発行者名を入力").await;
        assert!(!session.issuer_is_custom());
        assert!(!session.delete_selected_issuer().await);

        session.select_issuer("町内会").await;
        assert!(session.delete_selected_issuer().await);
        assert_eq!(session.document().issuer, "ここに発行者名を入力");
        assert!(session.document().issuers.custom().is_empty());
    }

    #[tokio::test]
    async fn test_empty_issuer_selects_default() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        assert!(!session.add_issuer("   ").await);
        assert_eq!(session.document().issuer, "ここに発行者名を入力");
    }

    #[tokio::test]
    async fn test_gradient_operations_persist() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        let builtin = session.gradients().len();

        // default colors are one of the builtin presets
        assert!(!session.save_gradient().await.unwrap());
        assert_eq!(session.gradients().len(), builtin);

        session
            .edit(|d| {
                d.primary_color = HexColor::parse("#123456").unwrap();
                d.accent_color = HexColor::parse("#ABCDEF").unwrap();
            })
            .await;
        assert!(session.save_gradient().await.unwrap());
        let custom = session.gradients().presets().last().unwrap().clone();
        assert!(session.is_active_gradient(&custom));

        let reopened = open(&dir).await;
        assert_eq!(reopened.gradients().len(), builtin + 1);

        let first = session.gradients().presets()[0].clone();
        session.apply_gradient(&first).await;
        assert_eq!(session.document().primary_color, first.primary);
        assert_eq!(session.remove_gradient(&custom).await.unwrap(), 1);
        assert_eq!(session.remove_gradient(&custom).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_section_operations() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        session.add_page_break().await;
        session.add_section().await;
        assert!(session.set_section_text(2, "B", "本文").await);
        assert!(!session.set_section_text(1, "x", "y").await);
        assert!(!session.set_section_text(9, "x", "y").await);

        session.tick();
        assert_eq!(session.pagination().len(), 2);
        assert!(!session.pagination().pages[1].header_visible);

        assert_eq!(session.wrap_bold(2, 0, 3).await.unwrap(), (2, 5));
        assert_eq!(session.document().sections[2].body, "**本**文");
        assert!(session.wrap_bold(1, 0, 0).await.is_err());

        assert!(!session.remove_section(3).await);
        assert!(session.remove_section(1).await);
        assert!(session.remove_section(0).await);
        assert!(session.remove_section(0).await);
        // never empty
        assert_eq!(session.document().sections.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_break_example() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session
            .edit(|d| {
                d.sections = vec![
                    Section::text("A", "x".repeat(2000)),
                    Section::page_break(),
                    Section::text("B", "y"),
                ];
            })
            .await;
        session.tick();

        let pagination = session.pagination();
        assert!(pagination.len() >= 2);
        assert!(pagination.pages[0].header_visible);
        assert!(pagination.pages[1..].iter().all(|p| !p.header_visible));
        assert!(pagination.page_of_section(2).unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_image_operations() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        let mut png = Vec::new();
        RgbaImage::new(4, 3)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        session.set_image(&png).await.unwrap();
        assert_eq!(session.document().image.as_ref().unwrap().mime_type(), "image/png");

        assert!(session.set_image(b"not an image").await.is_err());
        assert!(session.document().image.is_some());

        session.remove_image().await;
        assert!(session.document().image.is_none());
    }

    #[tokio::test]
    async fn test_zoom_is_clamped() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.tick();

        assert_eq!(session.set_zoom(5.0), 2.0);
        assert!(session.preview()[0].html.contains("scale(2)"));
        assert_eq!(session.set_zoom(0.0), 0.1);
        assert_eq!(session.zoom(), 0.1);
    }

    #[tokio::test]
    async fn test_history_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        session.edit(|d| d.title = "first".to_string()).await;
        let first = session.save_to_history().await.unwrap();
        assert_eq!(
            session.notices().current().unwrap().content,
            "現在の状態を履歴に保存しました。"
        );
        session.edit(|d| d.title = "second".to_string()).await;

        assert!(!session.load_history(first, &mut always(false)).await.unwrap());
        assert_eq!(session.document().title, "second");

        let mut asked = Vec::new();
        let mut recording = |message: &str| {
            asked.push(message.to_string());
            true
        };
        assert!(session.load_history(first, &mut recording).await.unwrap());
        assert_eq!(asked, vec![CONFIRM_LOAD_HISTORY.to_string()]);
        assert_eq!(session.document().title, "first");

        assert!(!session.delete_history(first, &mut always(false)).await.unwrap());
        assert_eq!(session.history().len(), 1);
        assert!(session.delete_history(first, &mut always(true)).await.unwrap());
        assert!(session.history().is_empty());
        assert!(session.delete_history(first, &mut always(true)).await.is_err());

        let reopened = open(&dir).await;
        assert!(reopened.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        for i in 0..21 {
            session.edit(|d| d.title = format!("v{}", i)).await;
            session.save_to_history().await.unwrap();
        }

        assert_eq!(session.history().len(), 20);
        assert_eq!(session.history().entries()[0].title(), "v20");
        assert_eq!(session.history().entries()[19].title(), "v1");
    }

    #[tokio::test]
    async fn test_portable_key_transfer() {
        let source_dir = TempDir::new().unwrap();
        let mut source = open(&source_dir).await;
        source.edit(|d| d.title = "転送テスト 🚀".to_string()).await;
        source.add_issuer("商店会").await;
        let key = source.export_key().unwrap();

        let target_dir = TempDir::new().unwrap();
        let mut target = open(&target_dir).await;
        target.import_key(&key).await.unwrap();

        assert_eq!(target.current_state(), source.current_state());
        assert_eq!(
            target.notices().current().unwrap().content,
            "キーからデータを復元しました。"
        );
    }

    #[tokio::test]
    async fn test_invalid_key_leaves_document_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.edit(|d| d.title = "keep me".to_string()).await;
        let before = session.current_state();

        assert!(session.import_key("definitely not a key").await.is_err());

        assert_eq!(session.current_state(), before);
        let notice = session.notices().blocking().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.content, "無効なキーです。");
    }

    #[tokio::test]
    async fn test_json_file_transfer() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.edit(|d| d.footer = "問い合わせ先".to_string()).await;
        let path = session.export_json().await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("document_data_"));

        let other_dir = TempDir::new().unwrap();
        let mut other = open(&other_dir).await;
        other.import_json_file(&path).await.unwrap();
        assert_eq!(other.document().footer, "問い合わせ先");

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[not json").unwrap();
        let before = other.current_state();
        assert!(other.import_json_file(&broken).await.is_err());
        assert_eq!(other.current_state(), before);
        assert_eq!(
            other.notices().blocking().unwrap().content,
            "ファイルの読み込みに失敗しました。"
        );
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.edit(|d| d.title = "消さないで".to_string()).await;
        session.save_to_history().await.unwrap();

        assert!(!session.reset(&mut always(false)).await.unwrap());
        assert_eq!(session.document().title, "消さないで");

        assert!(session.reset(&mut always(true)).await.unwrap());
        assert_eq!(session.document().title, "");
        assert!(!dir.path().join("data").join("state.json").exists());
        assert_eq!(session.history().len(), 1);

        let reopened = open(&dir).await;
        assert_eq!(reopened.document().title, "");
    }

    #[tokio::test]
    async fn test_export_pdf_and_image() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;
        session.edit(|d| d.title = "案内".to_string()).await;
        session.add_page_break().await;

        let progress = session.export_progress();
        let rasterizer = WhiteRasterizer { fail: false };
        let pdf = session.export_pdf(&rasterizer).await.unwrap();
        assert_eq!(pdf.path, dir.path().join("exports").join("案内.pdf"));
        assert!(!session.export_busy());
        assert_eq!(progress.borrow().percent, 100.0);

        let png = session
            .export_image(&rasterizer, RasterFormat::Png)
            .await
            .unwrap();
        assert_eq!(png.warning.as_deref(), Some("1ページ目のみ対応しています。"));
        assert!(session
            .notices()
            .history()
            .any(|n| n.kind == NoticeKind::Warning));
    }

    #[tokio::test]
    async fn test_failed_export_reenables() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        let result = session.export_pdf(&WhiteRasterizer { fail: true }).await;

        assert!(result.is_err());
        assert!(!session.export_busy());
        assert!(session.notices().blocking().is_some());
        assert!(!dir.path().join("exports").join("document.pdf").exists());
    }

    #[tokio::test]
    async fn test_history_unchanged_when_write_fails() {
        let dir = TempDir::new().unwrap();
        // a file where the data directory should be
        std::fs::write(dir.path().join("data"), b"").unwrap();
        let mut session = open(&dir).await;

        assert!(session.save_to_history().await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_image_in_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut session = open(&dir).await;

        session
            .apply_state(StateSnapshot {
                title: Some("画像つき".to_string()),
                image_data: Some("data:image/svg+xml;base64,PHN2Zz4=".to_string()),
                ..StateSnapshot::default()
            })
            .await;

        assert_eq!(session.document().title, "画像つき");
        assert!(session.document().image.is_none());
        assert!(session
            .notices()
            .history()
            .any(|n| n.kind == NoticeKind::Warning && n.content == NOTICE_IMAGE_DROPPED));
    }
}
