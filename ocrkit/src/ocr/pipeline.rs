use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::engine::{OcrEngine, TesseractEngine};
use super::extractor::{self, ExtractionResult};
use super::image_ref::ImageRef;
use super::preprocessing::{self, PreprocessedImage, Strategy};
use super::recovery::{self, RecoveryOptions, RetryPlan};
use super::regions::{self, Region};
use crate::config::OcrConfig;
use crate::error::{OcrKitError, Result};

/// Entry point for preprocessing, extraction and recovery.
///
/// The synchronous methods block on image work and the OCR subprocess. The
/// `*_async` variants run the same code on tokio's blocking pool; dropping
/// their future does not stop work already handed to a worker.
#[derive(Clone)]
pub struct OcrPipeline {
    engine: Arc<dyn OcrEngine>,
    config: OcrConfig,
}

impl OcrPipeline {
    /// Build a pipeline backed by the tesseract binary named in `config`.
    pub fn new(config: &OcrConfig) -> Self {
        let engine = TesseractEngine::new(&config.tesseract_path);
        if engine.is_available() {
            info!(binary = %config.tesseract_path.display(), "Tesseract OCR engine configured");
        } else {
            warn!(
                binary = %config.tesseract_path.display(),
                "Tesseract binary not found, extraction will fail until it is installed"
            );
        }
        Self::with_engine(config, Arc::new(engine))
    }

    pub fn with_engine(config: &OcrConfig, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            config: config.clone(),
        }
    }

    /// Same pipeline, writing derived images under `dir`.
    ///
    /// Use a distinct directory per call when several calls share a source.
    pub fn with_scratch_dir(&self, dir: impl Into<PathBuf>) -> Self {
        let mut config = self.config.clone();
        config.scratch_dir = Some(dir.into());
        Self {
            engine: Arc::clone(&self.engine),
            config,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    fn scratch_for(&self, src: &ImageRef) -> PathBuf {
        src.scratch_root(self.config.scratch_dir.as_deref())
    }

    /// Initial cleanup pass (Otsu binarization) written as `<stem>_preprocessed.<ext>`.
    pub fn preprocess_image(&self, src: impl AsRef<Path>) -> Result<PreprocessedImage> {
        let src = ImageRef::new(src)?;
        let scratch = self.scratch_for(&src);
        preprocessing::preprocess(&src, Strategy::Otsu, &scratch, "preprocessed")
    }

    /// Apply one strategy, written as `<stem>_retry_<strategy>.<ext>`.
    pub fn retry_preprocess(
        &self,
        src: impl AsRef<Path>,
        strategy: Strategy,
    ) -> Result<PreprocessedImage> {
        let src = ImageRef::new(src)?;
        let scratch = self.scratch_for(&src);
        preprocessing::preprocess(
            &src,
            strategy,
            &scratch,
            &format!("retry_{}", strategy.as_str()),
        )
    }

    /// Like [`retry_preprocess`](Self::retry_preprocess) with the strategy given by name.
    pub fn retry_preprocess_named(
        &self,
        src: impl AsRef<Path>,
        strategy: &str,
    ) -> Result<PreprocessedImage> {
        let strategy: Strategy = strategy.parse()?;
        self.retry_preprocess(src, strategy)
    }

    pub fn detect_text_regions(&self, src: impl AsRef<Path>) -> Result<Vec<Region>> {
        let src = ImageRef::new(src)?;
        let scratch = self.scratch_for(&src);
        regions::detect_regions(&src, &self.config.region, &scratch)
    }

    pub fn extract_text(
        &self,
        src: impl AsRef<Path>,
        lang: &str,
        threshold: u8,
    ) -> Result<ExtractionResult> {
        let src = ImageRef::new(src)?;
        extractor::extract(self.engine.as_ref(), &src, lang, threshold)
    }

    /// [`extract_text`](Self::extract_text) with the configured language and threshold.
    pub fn extract_text_default(&self, src: impl AsRef<Path>) -> Result<ExtractionResult> {
        self.extract_text(src, &self.config.languages, self.config.extraction_threshold)
    }

    /// Extract with confidence-gated retries; see [`recovery::recover_extract`].
    ///
    /// Gating uses `retry_threshold` from the config, not `extraction_threshold`.
    pub fn recover_extract(
        &self,
        src: impl AsRef<Path>,
        max_retries: u32,
    ) -> Result<ExtractionResult> {
        let src = ImageRef::new(src)?;
        let scratch = self.scratch_for(&src);
        let plan = RetryPlan::new(max_retries);
        let opts = RecoveryOptions {
            lang: &self.config.languages,
            threshold: self.config.retry_threshold,
            scratch: &scratch,
            cleanup: self.config.cleanup_scratch,
        };
        recovery::recover_extract(self.engine.as_ref(), &src, &plan, &opts)
    }

    pub fn recover_extract_default(&self, src: impl AsRef<Path>) -> Result<ExtractionResult> {
        self.recover_extract(src, self.config.max_retries)
    }

    pub async fn preprocess_image_async(
        &self,
        src: impl Into<PathBuf>,
    ) -> Result<PreprocessedImage> {
        let src = src.into();
        self.offload(move |p| p.preprocess_image(&src)).await
    }

    pub async fn detect_text_regions_async(&self, src: impl Into<PathBuf>) -> Result<Vec<Region>> {
        let src = src.into();
        self.offload(move |p| p.detect_text_regions(&src)).await
    }

    pub async fn extract_text_async(
        &self,
        src: impl Into<PathBuf>,
        lang: &str,
        threshold: u8,
    ) -> Result<ExtractionResult> {
        let src = src.into();
        let lang = lang.to_string();
        self.offload(move |p| p.extract_text(&src, &lang, threshold))
            .await
    }

    pub async fn recover_extract_async(
        &self,
        src: impl Into<PathBuf>,
        max_retries: u32,
    ) -> Result<ExtractionResult> {
        let src = src.into();
        self.offload(move |p| p.recover_extract(&src, max_retries))
            .await
    }

    async fn offload<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&OcrPipeline) -> Result<T> + Send + 'static,
    {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || work(&pipeline))
            .await
            .map_err(|e| OcrKitError::Internal(format!("OCR task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionConfig;
    use crate::ocr::engine::Recognition;

    struct PanickingEngine;

    impl OcrEngine for PanickingEngine {
        fn recognize(&self, _image: &Path, _lang: &str) -> Result<Recognition> {
            panic!("engine blew up");
        }
    }

    fn test_config() -> OcrConfig {
        OcrConfig {
            tesseract_path: PathBuf::from("/nonexistent/tesseract"),
            languages: "eng".to_string(),
            extraction_threshold: 80,
            retry_threshold: 80,
            max_retries: 3,
            scratch_dir: None,
            cleanup_scratch: false,
            region: RegionConfig {
                binary_threshold: 127,
                min_width: 50,
                min_height: 10,
                write_crops: true,
            },
        }
    }

    #[test]
    fn test_with_scratch_dir_only_changes_scratch() {
        let pipeline = OcrPipeline::new(&test_config());
        let scoped = pipeline.with_scratch_dir("/tmp/job-1");
        assert_eq!(scoped.config().scratch_dir, Some(PathBuf::from("/tmp/job-1")));
        assert!(pipeline.config().scratch_dir.is_none());
        assert_eq!(scoped.config().languages, "eng");
    }

    #[test]
    fn test_unknown_strategy_name() {
        let pipeline = OcrPipeline::new(&test_config());
        let err = pipeline
            .retry_preprocess_named("/tmp/scan.png", "blur")
            .unwrap_err();
        assert!(matches!(err, OcrKitError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn test_worker_panic_maps_to_internal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        image::GrayImage::new(8, 8).save(&path).unwrap();

        let pipeline = OcrPipeline::with_engine(&test_config(), Arc::new(PanickingEngine));
        let err = pipeline.extract_text_async(path, "eng", 80).await.unwrap_err();
        assert!(matches!(err, OcrKitError::Internal(_)));
    }
}
