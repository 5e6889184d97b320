//! Error types for the certify-points library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CertifyError`] is **fatal**: the submission cannot be classified at all
//!   (undecodable payload, unsupported media, a PDF without pages, no readable
//!   text, text that does not look like a certificate). Returned as
//!   `Err(CertifyError)` from the top-level `classify*` functions. Every
//!   variant maps onto exactly one [`ErrorKind`].
//!
//! * [`VariantError`] is **non-fatal**: a single preprocessing technique or OCR
//!   call failed for one page variant. The pipeline logs it, counts it, and
//!   keeps going with the remaining variants.

use crate::pipeline::preprocess::Technique;
use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The user-facing failure category of a submission.
///
/// Collaborators (an HTTP layer, a queue worker) map this onto their own
/// status vocabulary; [`ErrorKind::status_hint`] gives the conventional HTTP
/// status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DecodeError,
    UnsupportedMediaType,
    PayloadTooLarge,
    RasterizationFailure,
    ExtractionFailure,
    ValidationFailure,
    InternalError,
}

impl ErrorKind {
    /// Conventional HTTP status code for this kind.
    pub fn status_hint(self) -> u16 {
        match self {
            ErrorKind::DecodeError | ErrorKind::UnsupportedMediaType => 400,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::RasterizationFailure
            | ErrorKind::ExtractionFailure
            | ErrorKind::ValidationFailure => 422,
            ErrorKind::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::RasterizationFailure => "RasterizationFailure",
            ErrorKind::ExtractionFailure => "ExtractionFailure",
            ErrorKind::ValidationFailure => "ValidationFailure",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(name)
    }
}

/// All fatal errors returned by the certify-points library.
#[derive(Debug, Error)]
pub enum CertifyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The transport encoding (base64 / data URL) is malformed.
    #[error("Could not decode submission payload: {detail}")]
    Decode { detail: String },

    /// The payload sniffed as an image format we accept but did not decode.
    #[error("Could not decode {format} image: {detail}")]
    ImageDecode { format: &'static str, detail: String },

    /// Sniffed or guessed media type is outside {pdf, png, jpeg}.
    #[error("Unsupported media type '{mime}'{}\nAccepted: PDF, PNG, JPEG.", filename_suffix(.filename))]
    UnsupportedMediaType {
        mime: String,
        filename: Option<String>,
    },

    /// Payload exceeds the configured size limit.
    #[error("Payload is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// A local input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF could not be opened or rendered, or produced zero pages.
    #[error("PDF rasterisation failed: {detail}")]
    Rasterization { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── Content errors ────────────────────────────────────────────────────
    /// No variant of any page produced a usable text fragment.
    #[error("No usable text extracted from {variants} image variants{}", first_error_suffix(.first_error))]
    NoText {
        variants: usize,
        first_error: Option<String>,
    },

    /// The aggregated text does not look like a certificate.
    #[error("Submission rejected: {0}")]
    Validation(#[from] ValidationFailure),

    // ── Runtime errors ────────────────────────────────────────────────────
    /// The overall time budget ran out.
    #[error("Time budget of {budget_ms}ms exhausted during {stage} stage")]
    Timeout { stage: Stage, budget_ms: u64 },

    /// Builder validation failed, or a rule table is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CertifyError {
    /// The user-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CertifyError::Decode { .. } | CertifyError::ImageDecode { .. } => {
                ErrorKind::DecodeError
            }
            CertifyError::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            CertifyError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            CertifyError::Rasterization { .. } => ErrorKind::RasterizationFailure,
            CertifyError::NoText { .. } => ErrorKind::ExtractionFailure,
            CertifyError::Validation(_) => ErrorKind::ValidationFailure,
            CertifyError::InputUnreadable { .. }
            | CertifyError::PdfiumBindingFailed(_)
            | CertifyError::Timeout { .. }
            | CertifyError::InvalidConfig(_)
            | CertifyError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

fn filename_suffix(filename: &Option<String>) -> String {
    filename
        .as_ref()
        .map(|f| format!(" for '{f}'"))
        .unwrap_or_default()
}

fn first_error_suffix(first_error: &Option<String>) -> String {
    first_error
        .as_ref()
        .map(|e| format!("\nFirst error: {e}"))
        .unwrap_or_default()
}

/// Why aggregated text failed the plausibility gate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationFailure {
    #[error("extracted text is {len} characters, at least {min} required")]
    TooShort { len: usize, min: usize },

    #[error("found {} certificate indicator(s) {found:?}, at least {required} required", .found.len())]
    TooFewIndicators { found: Vec<String>, required: usize },
}

/// A non-fatal error for a single page variant.
///
/// Absorbed by the pipeline: logged, reported to the progress callback, and
/// counted in [`crate::output::PipelineStats::variants_failed`].
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum VariantError {
    /// The preprocessing technique could not produce an image.
    #[error("Page {page}, {technique}: preprocessing failed: {detail}")]
    PreprocessFailed {
        page: usize,
        technique: Technique,
        detail: String,
    },

    /// The OCR engine failed on this variant.
    #[error("Page {page}, {technique}: OCR failed: {detail}")]
    OcrFailed {
        page: usize,
        technique: Technique,
        detail: String,
    },
}
