//! Pipeline stages for certificate classification.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (another OCR engine, another PDF backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ preprocess ──▶ ocr ──▶ aggregate ──▶ validate ──▶ categorize
//! (bytes)   (pdfium)   (4 variants)  (tess)   (dedup)       (gate)       (rules)
//! ```
//!
//! 1. [`input`]: decode the transport payload and sniff the media type
//! 2. [`render`]: rasterise the first pages of a PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe. Images skip this step.
//! 3. [`preprocess`]: derive original / grayscale / binarised / adaptive
//!    variants of every page
//! 4. [`ocr`]: recognise text per variant; [`encode`] turns variants into
//!    the PNG bytes OCR engines consume
//! 5. [`aggregate`]: drop noise fragments, deduplicate, join
//! 6. [`validate`]: reject text that does not look like a certificate
//! 7. [`categorize`]: first matching rule wins

pub mod aggregate;
pub mod categorize;
pub mod encode;
pub mod input;
pub mod ocr;
pub mod preprocess;
pub mod render;
pub mod validate;
