//! Classification entry points.
//!
//! [`classify`] drives one submission through every stage and returns either
//! a [`ClassificationOutput`] or the fatal [`CertifyError`] that stopped it.
//! Per-variant failures never surface here; they are counted in
//! [`PipelineStats::variants_failed`] and reported to the progress callback.

use crate::config::ClassifierConfig;
use crate::error::{CertifyError, VariantError};
use crate::output::{ClassificationOutput, ClassificationResult, PipelineStats};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::categorize::categorize;
use crate::pipeline::input::{detect_media, MediaDescriptor, MediaType, Submission};
use crate::pipeline::ocr::{clean_ocr_text, recognize_variant, OcrEngine, TesseractCommand, TextFragment};
use crate::pipeline::preprocess::{self, ImageVariant};
use crate::pipeline::render::{enforce_page_window, PageRasterizer, PdfiumRasterizer, RasterPage};
use crate::pipeline::validate::validate;
use crate::progress::Stage;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Classify one submission.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(CertifyError)` for fatal failures only:
/// - payload too large, undecodable, or of an unsupported type
/// - a PDF that cannot be opened or has no pages
/// - no text fragment survived from any variant of any page
/// - text that does not pass the certificate plausibility gate
/// - the time budget ran out
///
/// Exactly one of `on_complete` / `on_failure` is fired on the configured
/// progress callback before this returns.
pub async fn classify(
    submission: Submission,
    config: &ClassifierConfig,
) -> Result<ClassificationOutput, CertifyError> {
    let result = run_pipeline(submission, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(output) => cb.on_complete(&output.result()),
            Err(e) => cb.on_failure(e.kind(), &e.to_string()),
        }
    }
    if let Err(ref e) = result {
        warn!("Submission failed ({}): {}", e.kind(), e);
    }
    result
}

/// Synchronous wrapper around [`classify`].
///
/// Creates a temporary tokio runtime internally.
pub fn classify_sync(
    submission: Submission,
    config: &ClassifierConfig,
) -> Result<ClassificationOutput, CertifyError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CertifyError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(classify(submission, config))
}

/// Read a local file into a [`Submission`], using its name as the filename.
pub async fn load_submission(path: impl AsRef<Path>) -> Result<Submission, CertifyError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CertifyError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut submission = Submission::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        submission = submission.with_filename(name);
    }
    Ok(submission)
}

/// Classify a local image or PDF file.
///
/// # Example
/// ```rust,no_run
/// use certify_points::{classify_file, ClassifierConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClassifierConfig::default();
/// let output = classify_file("nptel.pdf", &config).await?;
/// println!("{} ({} points)", output.category, output.points);
/// # Ok(())
/// # }
/// ```
pub async fn classify_file(
    path: impl AsRef<Path>,
    config: &ClassifierConfig,
) -> Result<ClassificationOutput, CertifyError> {
    let submission = load_submission(path).await?;
    classify(submission, config).await
}

/// Validate and classify text that was extracted elsewhere.
///
/// The text is normalised the same way OCR output is (lowercased, whitespace
/// collapsed) before the length and indicator checks.
pub fn classify_text(
    text: &str,
    config: &ClassifierConfig,
) -> Result<ClassificationResult, CertifyError> {
    let text = clean_ocr_text(text);
    validate(&text, &config.validation_policy())?;
    Ok(categorize(&text, &config.rules))
}

// ── Pipeline ─────────────────────────────────────────────────────────────

async fn run_pipeline(
    submission: Submission,
    config: &ClassifierConfig,
) -> Result<ClassificationOutput, CertifyError> {
    let deadline = Deadline::new(config.timeout);
    let username = submission.username().map(str::to_string);
    emit(config, Stage::Received);
    info!(
        "Received submission: {} bytes, filename={:?}",
        submission.payload().len(),
        submission.filename()
    );

    // ── Step 1: Size gate and media detection ────────────────────────────
    let size = submission.payload().len();
    if size == 0 {
        return Err(CertifyError::Decode {
            detail: "payload is empty".into(),
        });
    }
    if size > config.max_payload_bytes {
        return Err(CertifyError::PayloadTooLarge {
            size,
            limit: config.max_payload_bytes,
        });
    }
    let media = detect_media(&submission)?;
    info!("Detected {} via {:?}", media.media_type, media.source);
    emit(config, Stage::Decoded);

    // ── Step 2: Obtain page images ───────────────────────────────────────
    let render_start = Instant::now();
    let pages = load_pages(&submission, media, config, &deadline).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    drop(submission);
    info!("{} page image(s) ready in {}ms", pages.len(), render_duration_ms);

    // ── Step 3: Preprocess every page with every technique ───────────────
    deadline.check(Stage::Preprocessed)?;
    let page_count = pages.len();
    let (variants, mut failures) = preprocess_pages(pages, config, &deadline).await?;
    info!(
        "Preprocessed {} page(s) into {} variant(s), {} failed",
        page_count,
        variants.len(),
        failures.len()
    );
    emit(config, Stage::Preprocessed);

    // ── Step 4: OCR every variant ────────────────────────────────────────
    deadline.check(Stage::Extracted)?;
    let variant_count = variants.len();
    let ocr_start = Instant::now();
    let (fragments, ocr_failures) = recognize_all(variants, config, &deadline).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    failures.extend(ocr_failures);
    info!(
        "OCR produced {} fragment(s) from {} variant(s) in {}ms",
        fragments.len(),
        variant_count,
        ocr_duration_ms
    );

    // ── Step 5: Aggregate ────────────────────────────────────────────────
    let aggregated = aggregate(fragments, config.min_fragment_len);
    if aggregated.is_empty() {
        return Err(CertifyError::NoText {
            variants: page_count * config.techniques.len(),
            first_error: failures.first().map(|e| e.to_string()),
        });
    }
    debug!(
        "Aggregated {} chars from {} fragment(s), {} dropped",
        aggregated.char_len(),
        aggregated.fragments_kept,
        aggregated.fragments_dropped
    );
    emit(config, Stage::Extracted);

    // ── Step 6: Validate ─────────────────────────────────────────────────
    deadline.check(Stage::Validated)?;
    let indicators_found = validate(&aggregated.text, &config.validation_policy())?;
    emit(config, Stage::Validated);

    // ── Step 7: Classify ─────────────────────────────────────────────────
    let result = categorize(&aggregated.text, &config.rules);
    emit(config, Stage::Classified);

    let stats = PipelineStats {
        media_type: media.media_type,
        detected_by: media.source,
        pages: page_count,
        variants: variant_count,
        variants_failed: failures.len(),
        fragments_kept: aggregated.fragments_kept,
        fragments_dropped: aggregated.fragments_dropped,
        text_chars: aggregated.char_len(),
        indicators_found,
        total_duration_ms: deadline.elapsed().as_millis() as u64,
        render_duration_ms,
        ocr_duration_ms,
    };

    info!(
        "Classified as '{}' ({} points) in {}ms",
        result.category, result.points, stats.total_duration_ms
    );

    Ok(ClassificationOutput {
        category: result.category,
        points: result.points,
        username,
        matched_pattern: result.matched_pattern,
        stats,
    })
}

/// Decode an image payload, or rasterise the first pages of a PDF.
async fn load_pages(
    submission: &Submission,
    media: MediaDescriptor,
    config: &ClassifierConfig,
    deadline: &Deadline,
) -> Result<Vec<RasterPage>, CertifyError> {
    let payload = submission.shared_payload();

    match media.media_type {
        MediaType::Pdf => {
            deadline.check(Stage::Rasterized)?;
            let rasterizer = resolve_rasterizer(config);
            let options = config.render_options();
            let task = tokio::task::spawn_blocking(move || rasterizer.rasterize(&payload, &options));
            let pages = deadline
                .bound(Stage::Rasterized, task)
                .await?
                .map_err(|e| CertifyError::Internal(format!("render task failed: {e}")))??;

            let rendered = pages.len();
            let pages = enforce_page_window(pages, config.max_pages);
            if pages.is_empty() {
                return Err(CertifyError::Rasterization {
                    detail: "PDF has zero pages".into(),
                });
            }
            if rendered > pages.len() {
                debug!(
                    "Rasteriser returned {} pages; kept the first {}",
                    rendered,
                    pages.len()
                );
            }
            emit(config, Stage::Rasterized);
            Ok(pages)
        }
        image_type => {
            let format = image_type.image_format().ok_or_else(|| {
                CertifyError::Internal(format!("no image decoder for {image_type}"))
            })?;
            let task = tokio::task::spawn_blocking(move || {
                image::load_from_memory_with_format(&payload, format)
            });
            let image = deadline
                .bound(Stage::Decoded, task)
                .await?
                .map_err(|e| CertifyError::Internal(format!("decode task failed: {e}")))?
                .map_err(|e| CertifyError::ImageDecode {
                    format: image_type.mime(),
                    detail: e.to_string(),
                })?;
            Ok(vec![RasterPage::new(0, image)])
        }
    }
}

/// Fan out (page × technique) preprocessing jobs on the blocking pool.
///
/// Raster pages are consumed; each job holds its own `Arc` to the page image.
async fn preprocess_pages(
    pages: Vec<RasterPage>,
    config: &ClassifierConfig,
    deadline: &Deadline,
) -> Result<(Vec<ImageVariant>, Vec<VariantError>), CertifyError> {
    let jobs: Vec<_> = pages
        .into_iter()
        .flat_map(|page| {
            config
                .techniques
                .iter()
                .map(move |&technique| (page.index, technique, Arc::clone(&page.image)))
                .collect::<Vec<_>>()
        })
        .collect();

    let settings = config.preprocess;
    let callback = config.progress_callback.clone();

    let work = stream::iter(jobs.into_iter().map(|(page, technique, image)| {
        let callback = callback.clone();
        async move {
            let joined =
                tokio::task::spawn_blocking(move || preprocess::apply(technique, &image, &settings))
                    .await;
            let outcome = match joined {
                Ok(Ok(image)) => Ok(ImageVariant {
                    page,
                    technique,
                    image,
                }),
                Ok(Err(detail)) => Err(detail),
                Err(e) => Err(format!("task failed: {e}")),
            };
            outcome.map_err(|detail| {
                if let Some(ref cb) = callback {
                    cb.on_variant_error(page, technique, &detail);
                }
                VariantError::PreprocessFailed {
                    page,
                    technique,
                    detail,
                }
            })
        }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect::<Vec<_>>();

    let outcomes = deadline.bound(Stage::Preprocessed, work).await?;
    Ok(split_outcomes(outcomes))
}

/// Fan out one OCR job per variant on the blocking pool.
async fn recognize_all(
    variants: Vec<ImageVariant>,
    config: &ClassifierConfig,
    deadline: &Deadline,
) -> Result<(Vec<TextFragment>, Vec<VariantError>), CertifyError> {
    let engine = resolve_engine(config);
    debug!("Using OCR engine '{}'", engine.name());
    let callback = config.progress_callback.clone();

    let work = stream::iter(variants.into_iter().map(|variant| {
        let engine = Arc::clone(&engine);
        let callback = callback.clone();
        let (page, technique) = (variant.page, variant.technique);
        async move {
            let joined =
                tokio::task::spawn_blocking(move || recognize_variant(engine.as_ref(), &variant))
                    .await;
            let outcome = joined.unwrap_or_else(|e| {
                Err(VariantError::OcrFailed {
                    page,
                    technique,
                    detail: format!("task failed: {e}"),
                })
            });
            if let Some(ref cb) = callback {
                match &outcome {
                    Ok(fragment) => cb.on_variant_complete(page, technique, fragment.len()),
                    Err(e) => cb.on_variant_error(page, technique, &e.to_string()),
                }
            }
            outcome
        }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect::<Vec<_>>();

    let outcomes = deadline.bound(Stage::Extracted, work).await?;
    Ok(split_outcomes(outcomes))
}

fn split_outcomes<T>(outcomes: Vec<Result<T, VariantError>>) -> (Vec<T>, Vec<VariantError>) {
    let mut ok = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(v) => ok.push(v),
            Err(e) => {
                warn!("{}", e);
                failed.push(e);
            }
        }
    }
    (ok, failed)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn emit(config: &ClassifierConfig, stage: Stage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

/// Injected engine, else the `tesseract` executable.
fn resolve_engine(config: &ClassifierConfig) -> Arc<dyn OcrEngine> {
    match config.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractCommand::new(config.ocr.clone())),
    }
}

/// Injected rasteriser, else pdfium.
fn resolve_rasterizer(config: &ClassifierConfig) -> Arc<dyn PageRasterizer> {
    match config.rasterizer {
        Some(ref rasterizer) => Arc::clone(rasterizer),
        None => Arc::new(PdfiumRasterizer::new()),
    }
}

/// Overall time budget of one submission.
struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    fn new(budget: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn expired(&self, stage: Stage) -> CertifyError {
        CertifyError::Timeout {
            stage,
            budget_ms: self.budget.map(|b| b.as_millis() as u64).unwrap_or(0),
        }
    }

    /// Time left, `None` when unbounded.
    fn remaining(&self, stage: Stage) -> Result<Option<Duration>, CertifyError> {
        match self.budget {
            None => Ok(None),
            Some(budget) => match budget.checked_sub(self.elapsed()) {
                Some(left) if !left.is_zero() => Ok(Some(left)),
                _ => Err(self.expired(stage)),
            },
        }
    }

    fn check(&self, stage: Stage) -> Result<(), CertifyError> {
        self.remaining(stage).map(|_| ())
    }

    /// Await `fut`, failing with a timeout once the budget runs out.
    ///
    /// Blocking work already handed to the pool keeps running to completion;
    /// only the wait is abandoned.
    async fn bound<F: Future>(&self, stage: Stage, fut: F) -> Result<F::Output, CertifyError> {
        match self.remaining(stage)? {
            None => Ok(fut.await),
            Some(left) => tokio::time::timeout(left, fut)
                .await
                .map_err(|_| self.expired(stage)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rules::{HACKATHON, NPTEL, OTHER};

    #[test]
    fn classify_text_nptel() {
        let config = ClassifierConfig::default();
        let r = classify_text(
            "This is to certify completion of the certificate course. \
             NPTEL Online Certification course completed",
            &config,
        )
        .unwrap();
        assert_eq!(r.category, NPTEL);
        assert_eq!(r.points, 50);
    }

    #[test]
    fn classify_text_hackathon() {
        let config = ClassifierConfig::default();
        let r = classify_text(
            "Certificate of Completion awarded to the team for the hackathon winner 1st prize",
            &config,
        )
        .unwrap();
        assert_eq!(r.category, HACKATHON);
        assert_eq!(r.points, 40);
    }

    #[test]
    fn classify_text_default_category() {
        let config = ClassifierConfig::default();
        let r = classify_text(
            "Certificate of appreciation awarded for volunteering at the annual blood drive",
            &config,
        )
        .unwrap();
        assert_eq!(r.category, OTHER);
        assert_eq!(r.points, 10);
    }

    #[test]
    fn classify_text_rejects_short_text() {
        let err = classify_text("random text with no signal xx", &ClassifierConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn deadline_without_budget_never_expires() {
        let d = Deadline::new(None);
        assert!(d.check(Stage::Extracted).is_ok());
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let d = Deadline::new(Some(Duration::ZERO));
        match d.check(Stage::Preprocessed) {
            Err(CertifyError::Timeout { stage, budget_ms }) => {
                assert_eq!(stage, Stage::Preprocessed);
                assert_eq!(budget_ms, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bound_times_out_slow_future() {
        let d = Deadline::new(Some(Duration::from_millis(20)));
        let err = d
            .bound(Stage::Extracted, tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }
}
