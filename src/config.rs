//! Configuration types for certificate classification.
//!
//! All pipeline behaviour is controlled through [`ClassifierConfig`], built
//! via its [`ClassifierConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks, logged, and diffed between runs.
//!
//! The OCR engine, PDF rasteriser and rule table are injected here too.
//! Nothing in the pipeline reads global state, which is what lets tests run
//! the full pipeline against fake engines and alternate rule sets.

use crate::error::CertifyError;
use crate::pipeline::ocr::{OcrEngine, OcrSettings};
use crate::pipeline::preprocess::{PreprocessSettings, Technique};
use crate::pipeline::render::{PageRasterizer, RenderOptions};
use crate::pipeline::validate::{ValidationPolicy, DEFAULT_INDICATORS};
use crate::progress::ProgressCallback;
use crate::rules::RuleSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 16 MiB, the upload limit of the submission form.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for classifying one submission.
///
/// # Example
/// ```rust
/// use certify_points::ClassifierConfig;
///
/// let config = ClassifierConfig::builder()
///     .dpi(200)
///     .max_pages(2)
///     .min_text_len(40)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ClassifierConfig {
    /// Pages of a PDF that are rendered; later pages are ignored. Default: 3.
    pub max_pages: usize,

    /// Rendering DPI for PDF pages. Range: 72–600. Default: 300.
    ///
    /// Tesseract is trained on glyphs roughly 20–30 px tall; 300 DPI puts
    /// ordinary 10–12 pt certificate text in that band. Lower values lose
    /// the fine print (registration numbers, course codes), higher values
    /// mostly cost time.
    pub dpi: u32,

    /// Longest edge, in pixels, of a rendered page. Default: 5000.
    pub max_rendered_pixels: u32,

    /// Fragments must be longer than this many characters. Default: 10.
    pub min_fragment_len: usize,

    /// Inclusive minimum length of the aggregated text. Default: 50.
    pub min_text_len: usize,

    /// Distinct indicator keywords required. Default: 2.
    pub min_indicators: usize,

    /// Indicator keywords for the validation gate.
    pub indicators: Vec<String>,

    /// Priority-ordered category rules.
    pub rules: RuleSet,

    /// Largest accepted payload. Default: 16 MiB.
    pub max_payload_bytes: usize,

    /// Concurrent preprocessing / OCR jobs. Default: available CPU parallelism.
    ///
    /// OCR is CPU-bound; more jobs than cores only adds contention.
    pub concurrency: usize,

    /// Overall time budget per submission. Default: 120 s. `None` disables it.
    pub timeout: Option<Duration>,

    /// Preprocessing techniques applied to every page, in order.
    pub techniques: Vec<Technique>,

    /// Thresholding tunables.
    pub preprocess: PreprocessSettings,

    /// Language, segmentation mode and whitelist for the OCR engine.
    pub ocr: OcrSettings,

    /// Pre-constructed OCR engine. If None, the `tesseract` executable is used.
    pub engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed PDF rasteriser. If None, pdfium is bound on demand.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Optional stage observer.
    pub progress_callback: Option<ProgressCallback>,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_pages: 3,
            dpi: 300,
            max_rendered_pixels: 5000,
            min_fragment_len: 10,
            min_text_len: 50,
            min_indicators: 2,
            indicators: DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect(),
            rules: RuleSet::default(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            concurrency: default_concurrency(),
            timeout: Some(Duration::from_secs(120)),
            techniques: Technique::ALL.to_vec(),
            preprocess: PreprocessSettings::default(),
            ocr: OcrSettings::default(),
            engine: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("max_pages", &self.max_pages)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("min_fragment_len", &self.min_fragment_len)
            .field("min_text_len", &self.min_text_len)
            .field("min_indicators", &self.min_indicators)
            .field("indicators", &self.indicators)
            .field("rules", &self.rules.rules().len())
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("techniques", &self.techniques)
            .field("preprocess", &self.preprocess)
            .field("ocr", &self.ocr)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .finish()
    }
}

impl ClassifierConfig {
    /// Create a new builder for `ClassifierConfig`.
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn render_options(&self) -> RenderOptions {
        RenderOptions {
            dpi: self.dpi,
            max_pages: self.max_pages,
            max_pixels: self.max_rendered_pixels,
        }
    }

    pub(crate) fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            min_text_len: self.min_text_len,
            min_indicators: self.min_indicators,
            indicators: self.indicators.clone(),
        }
    }
}

/// Builder for [`ClassifierConfig`].
pub struct ClassifierConfigBuilder {
    config: ClassifierConfig,
}

impl fmt::Debug for ClassifierConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ClassifierConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn min_fragment_len(mut self, n: usize) -> Self {
        self.config.min_fragment_len = n;
        self
    }

    pub fn min_text_len(mut self, n: usize) -> Self {
        self.config.min_text_len = n;
        self
    }

    pub fn min_indicators(mut self, n: usize) -> Self {
        self.config.min_indicators = n;
        self
    }

    pub fn indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.indicators = indicators.into_iter().map(Into::into).collect();
        self
    }

    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.config.rules = rules;
        self
    }

    pub fn max_payload_bytes(mut self, n: usize) -> Self {
        self.config.max_payload_bytes = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn timeout(mut self, budget: Duration) -> Self {
        self.config.timeout = Some(budget);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    pub fn techniques(mut self, techniques: impl Into<Vec<Technique>>) -> Self {
        self.config.techniques = techniques.into();
        self
    }

    pub fn binarize_threshold(mut self, cutoff: u8) -> Self {
        self.config.preprocess.binarize_threshold = cutoff;
        self
    }

    pub fn adaptive_block_radius(mut self, radius: u32) -> Self {
        self.config.preprocess.adaptive_block_radius = radius.max(1);
        self
    }

    pub fn denoise_radius(mut self, radius: u32) -> Self {
        self.config.preprocess.denoise_radius = radius;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn page_seg_mode(mut self, psm: u8) -> Self {
        self.config.ocr.page_seg_mode = psm;
        self
    }

    pub fn char_whitelist(mut self, whitelist: impl Into<String>) -> Self {
        self.config.ocr.char_whitelist = whitelist.into();
        self
    }

    pub fn engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClassifierConfig, CertifyError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(CertifyError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_pages == 0 {
            return Err(CertifyError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        if c.concurrency == 0 {
            return Err(CertifyError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.techniques.is_empty() {
            return Err(CertifyError::InvalidConfig(
                "at least one preprocessing technique is required".into(),
            ));
        }
        if c.ocr.page_seg_mode > 13 {
            return Err(CertifyError::InvalidConfig(format!(
                "page segmentation mode must be 0–13, got {}",
                c.ocr.page_seg_mode
            )));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(CertifyError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.min_indicators > c.indicators.len() {
            return Err(CertifyError::InvalidConfig(format!(
                "min_indicators ({}) exceeds the number of indicators ({})",
                c.min_indicators,
                c.indicators.len()
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = ClassifierConfig::default();
        assert_eq!(c.max_pages, 3);
        assert_eq!(c.dpi, 300);
        assert_eq!(c.min_fragment_len, 10);
        assert_eq!(c.min_text_len, 50);
        assert_eq!(c.min_indicators, 2);
        assert_eq!(c.indicators.len(), 6);
        assert_eq!(c.max_payload_bytes, 16 * 1024 * 1024);
        assert_eq!(c.techniques, Technique::ALL.to_vec());
        assert_eq!(c.preprocess.binarize_threshold, 128);
        assert!(c.concurrency >= 1);
    }

    #[test]
    fn builder_clamps() {
        let c = ClassifierConfig::builder()
            .dpi(10_000)
            .max_pages(0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.max_pages, 1);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn empty_technique_list_rejected() {
        let err = ClassifierConfig::builder()
            .techniques(Vec::<Technique>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("technique"));
    }

    #[test]
    fn impossible_indicator_count_rejected() {
        let err = ClassifierConfig::builder()
            .indicators(["certificate"])
            .min_indicators(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, CertifyError::InvalidConfig(_)));
    }

    #[test]
    fn bad_psm_rejected() {
        assert!(ClassifierConfig::builder().page_seg_mode(14).build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", ClassifierConfig::default());
        assert!(s.contains("ClassifierConfig"));
        assert!(s.contains("dpi: 300"));
    }
}
