//! # certify-points
//!
//! Classify an uploaded certificate (image or PDF) into an activity category
//! and award its point value.
//!
//! ## Why OCR and rules?
//!
//! Students upload whatever they have: a phone photo of a printed NPTEL
//! certificate, a PDF exported by a hackathon platform, a scan with a seal
//! over the text. The crate reads the text with tesseract from several
//! enhanced variants of each page, merges what it finds, checks that the
//! result actually looks like a certificate, and then walks a priority-ordered
//! rule table. The first rule that matches decides the category. No model is
//! trained; the rule table is plain data and can be replaced at runtime.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Submission (bytes + filename/mime hint)
//!  │
//!  ├─ 1. Input       size gate, base64/data-URL decode, media sniffing
//!  ├─ 2. Render      first 3 PDF pages at 300 DPI via pdfium (spawn_blocking)
//!  ├─ 3. Preprocess  original / grayscale / binarize / adaptive+denoise
//!  ├─ 4. OCR         tesseract per variant, PSM 6, character whitelist
//!  ├─ 5. Aggregate   drop fragments ≤ 10 chars, exact dedup, join
//!  ├─ 6. Validate    ≥ 50 chars and ≥ 2 certificate indicators
//!  └─ 7. Categorize  first matching rule wins → category + points
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certify_points::{classify_file, ClassifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClassifierConfig::default();
//!     let output = classify_file("certificate.pdf", &config).await?;
//!     println!("{}: {} points", output.category, output.points);
//!     Ok(())
//! }
//! ```
//!
//! Text extracted by some other means can skip straight to the gate and the
//! rule table:
//!
//! ```rust
//! use certify_points::{classify_text, ClassifierConfig};
//!
//! let config = ClassifierConfig::default();
//! let result = classify_text(
//!     "This certificate of completion is awarded for the NPTEL online course",
//!     &config,
//! )
//! .unwrap();
//! assert_eq!(result.category, "NPTEL");
//! assert_eq!(result.points, 50);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `certify` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `tesseract` | off     | In-process [`pipeline::ocr::LibTesseract`] engine via libtesseract |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! certify-points = { version = "0.1", default-features = false }
//! ```
//!
//! ## Point Table
//!
//! | Category | Points |
//! |----------|--------|
//! | NPTEL | 50 |
//! | Hackathon/Competition | 40 |
//! | Internship | 30 |
//! | Professional Development | 20 |
//! | Other | 10 |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rules;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify, classify_file, classify_sync, classify_text, load_submission};
pub use config::{ClassifierConfig, ClassifierConfigBuilder, DEFAULT_MAX_PAYLOAD_BYTES};
pub use error::{CertifyError, ErrorKind, ValidationFailure, VariantError};
pub use output::{ClassificationOutput, ClassificationResult, FailureReport, PipelineStats};
pub use pipeline::input::{DetectionSource, MediaType, Submission};
pub use pipeline::ocr::{OcrEngine, OcrError, OcrSettings, TesseractCommand};
pub use pipeline::preprocess::Technique;
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer, RasterPage, RenderOptions};
pub use progress::{ClassificationProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use rules::{CategoryRule, Pattern, RuleSet};
