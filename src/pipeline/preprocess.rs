//! Image preprocessing: derive OCR-friendly variants from one page image.
//!
//! Tesseract's accuracy swings with contrast and noise, and those depend on
//! how the certificate was captured (flatbed scan, phone photo, exported PDF).
//! Rather than guess, every technique in the configured list runs on every
//! page and OCR reads all of them; the aggregator later deduplicates.
//!
//! | Technique          | Output                                            |
//! |--------------------|---------------------------------------------------|
//! | `original`         | the page as rendered / decoded                    |
//! | `grayscale`        | 8-bit luminance                                   |
//! | `binarize`         | luminance < cutoff → black, else white            |
//! | `adaptive_denoise` | local adaptive threshold, then a median filter    |
//!
//! Each technique is a pure function of the page image. A failure (including
//! a panic inside `imageproc`) only removes that one variant.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::median_filter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Above this pixel count the integral image used by adaptive thresholding
/// can overflow its `u32` accumulators.
const ADAPTIVE_MAX_PIXELS: u64 = 16_000_000;

/// One preprocessing technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    Original,
    Grayscale,
    Binarize,
    AdaptiveDenoise,
}

impl Technique {
    /// The full technique list, in canonical order.
    pub const ALL: [Technique; 4] = [
        Technique::Original,
        Technique::Grayscale,
        Technique::Binarize,
        Technique::AdaptiveDenoise,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Technique::Original => "original",
            Technique::Grayscale => "grayscale",
            Technique::Binarize => "binarize",
            Technique::AdaptiveDenoise => "adaptive_denoise",
        }
    }

    /// Parse a technique name as printed by [`Technique::name`].
    pub fn parse(name: &str) -> Option<Self> {
        Technique::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tunables for the thresholding techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessSettings {
    /// Luminance cutoff for [`Technique::Binarize`]. Default: 128.
    pub binarize_threshold: u8,
    /// Neighbourhood radius for adaptive thresholding. Default: 15.
    pub adaptive_block_radius: u32,
    /// Median filter radius applied after adaptive thresholding. Default: 1.
    pub denoise_radius: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            binarize_threshold: 128,
            adaptive_block_radius: 15,
            denoise_radius: 1,
        }
    }
}

/// One preprocessed image ready for OCR.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    /// 0-indexed source page.
    pub page: usize,
    pub technique: Technique,
    pub image: Arc<DynamicImage>,
}

/// Apply one technique to a page image.
///
/// Panics inside the image libraries are caught and reported as `Err`.
pub fn apply(
    technique: Technique,
    source: &Arc<DynamicImage>,
    settings: &PreprocessSettings,
) -> Result<Arc<DynamicImage>, String> {
    if source.width() == 0 || source.height() == 0 {
        return Err("image has zero width or height".into());
    }

    let transform: fn(GrayImage, &PreprocessSettings) -> Result<GrayImage, String> =
        match technique {
            Technique::Original => return Ok(Arc::clone(source)),
            Technique::Grayscale => |gray, _| Ok(gray),
            Technique::Binarize => |gray, s| Ok(binarize(&gray, s.binarize_threshold)),
            Technique::AdaptiveDenoise => |gray, s| adaptive_denoise(&gray, s),
        };

    let outcome = catch_unwind(AssertUnwindSafe(|| transform(source.to_luma8(), settings)));

    match outcome {
        Ok(Ok(gray)) => Ok(Arc::new(DynamicImage::ImageLuma8(gray))),
        Ok(Err(detail)) => Err(detail),
        Err(_) => Err(format!("{technique} panicked inside the image library")),
    }
}

/// Fixed-threshold binarisation: below `cutoff` becomes black, the rest white.
pub fn binarize(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = gray.clone();
    for Luma([v]) in out.pixels_mut() {
        *v = if *v < cutoff { 0 } else { 255 };
    }
    out
}

fn adaptive_denoise(gray: &GrayImage, settings: &PreprocessSettings) -> Result<GrayImage, String> {
    let (w, h) = gray.dimensions();
    if w as u64 * h as u64 > ADAPTIVE_MAX_PIXELS {
        return Err(format!(
            "image too large for adaptive thresholding ({w}x{h})"
        ));
    }
    let thresholded = adaptive_threshold(gray, settings.adaptive_block_radius.max(1));
    Ok(median_filter(
        &thresholded,
        settings.denoise_radius,
        settings.denoise_radius,
    ))
}
