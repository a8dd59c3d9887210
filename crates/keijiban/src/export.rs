//! PDF and raster export on top of an external page rasterizer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::file_manager::{sanitize_file_stem, FileManager};
use crate::pdf::PdfWriter;
use crate::preview::RenderedPage;

pub const PDF_SECONDS_PER_PAGE: f32 = 4.0;
pub const IMAGE_EXPORT_SECONDS: f32 = 5.0;
pub const DEFAULT_PDF_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_IMAGE_JPEG_QUALITY: u8 = 90;
pub const FIRST_PAGE_ONLY_WARNING: &str = "1ページ目のみ対応しています。";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub scale: f32,
    pub width_px: f32,
    pub height_px: f32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            width_px: 793.7,
            height_px: 1122.0,
        }
    }
}

impl RasterOptions {
    /// Output bitmap size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_px * self.scale).round() as u32,
            (self.height_px * self.scale).round() as u32,
        )
    }
}

/// Turns one finalized page into a bitmap. Lives outside the core.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, page: &RenderedPage, options: &RasterOptions) -> Result<RgbaImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Time-based progress estimate shown while an export runs.
///
/// The bar never passes 90% on its own; only `finish` reaches 100%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    estimate_secs: f32,
}

impl ExportProgress {
    pub fn for_pdf(pages: usize) -> Self {
        Self {
            estimate_secs: pages as f32 * PDF_SECONDS_PER_PAGE,
        }
    }

    pub fn for_image() -> Self {
        Self {
            estimate_secs: IMAGE_EXPORT_SECONDS,
        }
    }

    pub fn estimate_secs(&self) -> f32 {
        self.estimate_secs
    }

    pub fn percent_at(&self, elapsed: Duration) -> f32 {
        if self.estimate_secs <= 0.0 {
            return 90.0;
        }
        (elapsed.as_secs_f32() / self.estimate_secs * 90.0).min(90.0)
    }

    pub fn remaining_secs_at(&self, elapsed: Duration) -> u64 {
        (self.estimate_secs - elapsed.as_secs_f32()).ceil().max(0.0) as u64
    }

    /// `約 N 秒`
    pub fn label_at(&self, elapsed: Duration) -> String {
        format!("約 {} 秒", self.remaining_secs_at(elapsed))
    }

    pub fn finish(&self) -> f32 {
        100.0
    }
}

/// What the progress indicator shows at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f32,
    /// `約 N 秒`, empty once finished.
    pub label: String,
}

impl ProgressUpdate {
    fn idle() -> Self {
        Self {
            percent: 0.0,
            label: String::new(),
        }
    }

    fn at(progress: &ExportProgress, elapsed: Duration) -> Self {
        Self {
            percent: progress.percent_at(elapsed),
            label: progress.label_at(elapsed),
        }
    }

    fn finished(progress: &ExportProgress) -> Self {
        Self {
            percent: progress.finish(),
            label: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    /// Shown to the user after a successful export.
    pub warning: Option<String>,
}

/// Runs one export at a time, page by page.
///
/// The busy flag is what the export affordance reflects; it is cleared
/// again on every outcome. Output is assembled in memory and written only
/// once complete.
pub struct Exporter {
    busy: bool,
    progress: watch::Sender<ProgressUpdate>,
    options: RasterOptions,
    pdf_quality: u8,
    image_quality: u8,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(
            RasterOptions::default(),
            DEFAULT_PDF_JPEG_QUALITY,
            DEFAULT_IMAGE_JPEG_QUALITY,
        )
    }
}

impl Exporter {
    pub fn new(options: RasterOptions, pdf_quality: u8, image_quality: u8) -> Self {
        let (progress, _) = watch::channel(ProgressUpdate::idle());
        Self {
            busy: false,
            progress,
            options,
            pdf_quality: pdf_quality.clamp(1, 100),
            image_quality: image_quality.clamp(1, 100),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    /// Progress of the running export. Every export ends at 100%, failed
    /// ones included.
    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.progress.subscribe()
    }

    /// Every page as one A4 page of `<title>.pdf`.
    pub async fn export_pdf(
        &mut self,
        rasterizer: &dyn PageRasterizer,
        pages: &[RenderedPage],
        title: &str,
        files: &FileManager,
    ) -> Result<ExportOutcome> {
        self.begin()?;
        let progress = ExportProgress::for_pdf(pages.len());
        log::info!(
            "Exporting {} pages to PDF (estimated {}s)",
            pages.len(),
            progress.estimate_secs()
        );

        let result = self
            .build_pdf(rasterizer, pages, title, files, &progress)
            .await;
        self.end("PDF", &progress, &result);
        result
    }

    /// The first page as `<title>.png` or `<title>.jpg`.
    pub async fn export_image(
        &mut self,
        rasterizer: &dyn PageRasterizer,
        pages: &[RenderedPage],
        title: &str,
        format: RasterFormat,
        files: &FileManager,
    ) -> Result<ExportOutcome> {
        self.begin()?;
        let progress = ExportProgress::for_image();
        log::info!(
            "Exporting first page as {} (estimated {}s)",
            format.extension(),
            progress.estimate_secs()
        );

        let result = self
            .build_image(rasterizer, pages, title, format, files, &progress)
            .await;
        self.end(format.extension(), &progress, &result);
        result
    }

    fn begin(&mut self) -> Result<()> {
        if self.busy {
            return Err(anyhow::anyhow!("エクスポートを実行中です"));
        }
        self.busy = true;
        self.progress.send_replace(ProgressUpdate::idle());
        Ok(())
    }

    fn end(&mut self, kind: &str, progress: &ExportProgress, result: &Result<ExportOutcome>) {
        self.busy = false;
        self.progress.send_replace(ProgressUpdate::finished(progress));
        match result {
            Ok(outcome) => log::info!("{} export finished: {}", kind, outcome.path.display()),
            Err(e) => log::error!("{} export failed: {:#}", kind, e),
        }
    }

    async fn build_pdf(
        &self,
        rasterizer: &dyn PageRasterizer,
        pages: &[RenderedPage],
        title: &str,
        files: &FileManager,
        progress: &ExportProgress,
    ) -> Result<ExportOutcome> {
        let started = Instant::now();
        let mut writer = PdfWriter::new();
        for page in pages {
            self.progress
                .send_replace(ProgressUpdate::at(progress, started.elapsed()));
            let bitmap = rasterizer
                .rasterize(page, &self.options)
                .await
                .with_context(|| format!("{}ページ目の画像化に失敗しました", page.number))?;
            let (width, height) = bitmap.dimensions();
            let jpeg = encode_jpeg(bitmap, self.pdf_quality)?;
            writer.add_jpeg_page(jpeg, width, height);
            log::debug!("Rasterized page {}/{}", page.number, page.total);
        }

        let bytes = writer.finish()?;
        let file_name = format!("{}.pdf", sanitize_file_stem(title));
        let path = files.write_export(&file_name, &bytes).await?;
        Ok(ExportOutcome {
            path,
            warning: None,
        })
    }

    async fn build_image(
        &self,
        rasterizer: &dyn PageRasterizer,
        pages: &[RenderedPage],
        title: &str,
        format: RasterFormat,
        files: &FileManager,
        progress: &ExportProgress,
    ) -> Result<ExportOutcome> {
        let started = Instant::now();
        let first = pages
            .first()
            .ok_or_else(|| anyhow::anyhow!("出力するページがありません"))?;
        let warning = (pages.len() > 1).then(|| FIRST_PAGE_ONLY_WARNING.to_string());

        self.progress
            .send_replace(ProgressUpdate::at(progress, started.elapsed()));
        let bitmap = rasterizer
            .rasterize(first, &self.options)
            .await
            .context("ページの画像化に失敗しました")?;
        let bytes = match format {
            RasterFormat::Png => encode_png(bitmap)?,
            RasterFormat::Jpeg => encode_jpeg(bitmap, self.image_quality)?,
        };

        let file_name = format!("{}.{}", sanitize_file_stem(title), format.extension());
        let path = files.write_export(&file_name, &bytes).await?;
        Ok(ExportOutcome { path, warning })
    }
}

fn encode_jpeg(bitmap: RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(bitmap).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .context("JPEGのエンコードに失敗しました")?;
    Ok(bytes)
}

fn encode_png(bitmap: RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(bitmap)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("PNGのエンコードに失敗しました")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Paints each page a flat color; optionally fails on one page number.
    struct FlatRasterizer {
        fail_on: Option<usize>,
        calls: AtomicUsize,
    }

    impl FlatRasterizer {
        fn new() -> Self {
            Self {
                fail_on: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_on(page: usize) -> Self {
            Self {
                fail_on: Some(page),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRasterizer for FlatRasterizer {
        async fn rasterize(&self, page: &RenderedPage, options: &RasterOptions) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(page.number) {
                return Err(anyhow::anyhow!("canvas error"));
            }
            let (w, h) = options.pixel_size();
            Ok(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
        }
    }

    fn pages(n: usize) -> Vec<RenderedPage> {
        (1..=n)
            .map(|number| RenderedPage {
                number,
                total: n,
                header_visible: number == 1,
                html: format!("<div>{}</div>", number),
            })
            .collect()
    }

    fn small_exporter() -> Exporter {
        Exporter::new(
            RasterOptions {
                scale: 1.0,
                width_px: 40.0,
                height_px: 56.0,
            },
            95,
            90,
        )
    }

    #[test]
    fn test_default_raster_size() {
        assert_eq!(RasterOptions::default().pixel_size(), (1587, 2244));
    }

    #[test]
    fn test_progress_estimate() {
        let progress = ExportProgress::for_pdf(3);
        assert_eq!(progress.estimate_secs(), 12.0);
        assert_eq!(progress.percent_at(Duration::from_secs(0)), 0.0);
        assert!((progress.percent_at(Duration::from_secs(6)) - 45.0).abs() < 0.001);
        assert_eq!(progress.percent_at(Duration::from_secs(60)), 90.0);
        assert_eq!(progress.remaining_secs_at(Duration::from_millis(4_200)), 8);
        assert_eq!(progress.remaining_secs_at(Duration::from_secs(30)), 0);
        assert_eq!(progress.label_at(Duration::from_secs(2)), "約 10 秒");
        assert_eq!(progress.finish(), 100.0);
        assert_eq!(ExportProgress::for_image().estimate_secs(), 5.0);
    }

    #[test]
    fn test_raster_format_names() {
        assert_eq!(RasterFormat::from_name("PNG"), Some(RasterFormat::Png));
        assert_eq!(RasterFormat::from_name("jpeg"), Some(RasterFormat::Jpeg));
        assert_eq!(RasterFormat::Jpeg.extension(), "jpg");
        assert_eq!(RasterFormat::from_name("gif"), None);
    }

    #[tokio::test]
    async fn test_pdf_export_writes_every_page() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let rasterizer = FlatRasterizer::new();
        let mut exporter = small_exporter();

        let outcome = exporter
            .export_pdf(&rasterizer, &pages(3), "回覧板", &files)
            .await
            .unwrap();

        assert_eq!(outcome.path, dir.path().join("回覧板.pdf"));
        assert!(outcome.warning.is_none());
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 3);
        let pdf = std::fs::read(&outcome.path).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(
            pdf.windows(b"/MediaBox".len())
                .filter(|w| *w == b"/MediaBox")
                .count(),
            3
        );
        assert!(!exporter.is_busy());
    }

    #[tokio::test]
    async fn test_untitled_export_name() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let outcome = small_exporter()
            .export_pdf(&FlatRasterizer::new(), &pages(1), "", &files)
            .await
            .unwrap();
        assert_eq!(outcome.path, dir.path().join("document.pdf"));
    }

    #[tokio::test]
    async fn test_failed_export_writes_nothing_and_clears_busy() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let rasterizer = FlatRasterizer::failing_on(2);
        let mut exporter = small_exporter();

        let error = exporter
            .export_pdf(&rasterizer, &pages(3), "失敗", &files)
            .await
            .unwrap_err();

        assert!(format!("{:#}", error).contains("2ページ目"));
        assert!(!exporter.is_busy());
        assert!(!dir.path().join("失敗.pdf").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Records what the progress receiver showed each time a page was
    /// rasterized.
    struct WatchingRasterizer {
        progress: watch::Receiver<ProgressUpdate>,
        seen: std::sync::Mutex<Vec<ProgressUpdate>>,
        fail: bool,
    }

    #[async_trait]
    impl PageRasterizer for WatchingRasterizer {
        async fn rasterize(&self, _page: &RenderedPage, options: &RasterOptions) -> Result<RgbaImage> {
            self.seen.lock().unwrap().push(self.progress.borrow().clone());
            if self.fail {
                return Err(anyhow::anyhow!("canvas error"));
            }
            let (w, h) = options.pixel_size();
            Ok(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])))
        }
    }

    #[tokio::test]
    async fn test_progress_ticks_then_reaches_100() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let mut exporter = small_exporter();
        let rasterizer = WatchingRasterizer {
            progress: exporter.subscribe(),
            seen: std::sync::Mutex::new(Vec::new()),
            fail: false,
        };

        exporter
            .export_pdf(&rasterizer, &pages(2), "進捗", &files)
            .await
            .unwrap();

        let seen = rasterizer.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|u| u.percent < 90.1 && u.label.starts_with("約 ")));
        let last = exporter.subscribe().borrow().clone();
        assert_eq!(last.percent, 100.0);
        assert!(last.label.is_empty());
    }

    #[tokio::test]
    async fn test_failed_export_still_reaches_100() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let mut exporter = small_exporter();
        let mut receiver = exporter.subscribe();
        let rasterizer = WatchingRasterizer {
            progress: exporter.subscribe(),
            seen: std::sync::Mutex::new(Vec::new()),
            fail: true,
        };

        let result = exporter
            .export_image(&rasterizer, &pages(1), "x", RasterFormat::Png, &files)
            .await;

        assert!(result.is_err());
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().percent, 100.0);
    }

    #[tokio::test]
    async fn test_image_export_first_page_only() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let rasterizer = FlatRasterizer::new();
        let mut exporter = small_exporter();

        let outcome = exporter
            .export_image(&rasterizer, &pages(2), "ちらし", RasterFormat::Png, &files)
            .await
            .unwrap();

        assert_eq!(outcome.path, dir.path().join("ちらし.png"));
        assert_eq!(outcome.warning.as_deref(), Some(FIRST_PAGE_ONLY_WARNING));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);

        let decoded = image::open(&outcome.path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 56));
    }

    #[tokio::test]
    async fn test_jpeg_export_single_page_has_no_warning() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let outcome = small_exporter()
            .export_image(&FlatRasterizer::new(), &pages(1), "x", RasterFormat::Jpeg, &files)
            .await
            .unwrap();

        assert!(outcome.warning.is_none());
        let bytes = std::fs::read(&outcome.path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_image_export_without_pages_fails() {
        let dir = TempDir::new().unwrap();
        let files = FileManager::new(dir.path());
        let mut exporter = small_exporter();
        let result = exporter
            .export_image(&FlatRasterizer::new(), &[], "x", RasterFormat::Png, &files)
            .await;
        assert!(result.is_err());
        assert!(!exporter.is_busy());
    }
}
