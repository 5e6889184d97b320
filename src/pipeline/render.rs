//! PDF rasterisation: render the first pages of a PDF to `DynamicImage` via pdfium.
//!
//! ## Why only the first pages?
//!
//! Certificates are one page, occasionally two with a verification page
//! attached. Rendering at OCR resolution is the single most memory-hungry
//! step, so the page window is capped (default 3) no matter how long the
//! document is; later pages never reach OCR.
//!
//! ## Why cap pixels as well as DPI?
//!
//! 300 DPI keeps small print legible for tesseract. An oversized page (a
//! poster exported as PDF) at 300 DPI would allocate hundreds of megabytes,
//! so `max_pixels` bounds the longest edge regardless of physical size.
//!
//! The caller runs [`PageRasterizer::rasterize`] on the blocking pool: pdfium
//! is CPU-bound and not async-safe.

use crate::error::CertifyError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Points per inch in PDF user space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// One rendered page.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 0-indexed page number within the source document.
    pub index: usize,
    pub image: Arc<DynamicImage>,
}

impl RasterPage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }
}

/// Rendering parameters derived from [`crate::config::ClassifierConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_pages: usize,
    pub max_pixels: u32,
}

/// Converts PDF bytes into page images.
///
/// Implementations must return pages in ascending index order and never more
/// than `options.max_pages`; the pipeline re-applies the cap regardless.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8], options: &RenderOptions)
        -> Result<Vec<RasterPage>, CertifyError>;
}

/// Indices of the pages to render for a document with `total` pages.
pub fn page_window(total: usize, max_pages: usize) -> Range<usize> {
    0..total.min(max_pages)
}

/// Clamp a page list to the configured window and restore page order.
pub fn enforce_page_window(mut pages: Vec<RasterPage>, max_pages: usize) -> Vec<RasterPage> {
    pages.sort_by_key(|p| p.index);
    pages.retain(|p| p.index < max_pages);
    pages.truncate(max_pages);
    pages
}

/// Production rasteriser backed by the pdfium library.
///
/// Library lookup order: the explicit path given to
/// [`PdfiumRasterizer::with_library_path`], then `PDFIUM_LIB_PATH`, then the
/// current directory, then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific pdfium library file or the directory containing it.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, CertifyError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(library_file(&path)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| CertifyError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

/// Accept either the library file itself or its directory.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        options: &RenderOptions,
    ) -> Result<Vec<RasterPage>, CertifyError> {
        let pdfium = self.bind()?;

        let document =
            pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|e| CertifyError::Rasterization {
                    detail: format!("cannot open PDF: {:?}", e),
                })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let window = page_window(total_pages, options.max_pages);
        info!(
            "PDF loaded: {} pages, rendering {} at {} DPI",
            total_pages,
            window.len(),
            options.dpi
        );

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(options.dpi as f32 / PDF_POINTS_PER_INCH)
            .set_maximum_width(options.max_pixels as i32)
            .set_maximum_height(options.max_pixels as i32);

        let mut results = Vec::with_capacity(window.len());

        for idx in window {
            let page = pages
                .get(idx as u16)
                .map_err(|e| CertifyError::Rasterization {
                    detail: format!("page {}: {:?}", idx + 1, e),
                })?;

            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| CertifyError::Rasterization {
                        detail: format!("page {}: {:?}", idx + 1, e),
                    })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(RasterPage::new(idx, image));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn page(index: usize) -> RasterPage {
        RasterPage::new(index, DynamicImage::ImageRgb8(RgbImage::new(2, 2)))
    }

    #[test]
    fn window_caps_long_documents() {
        assert_eq!(page_window(5, 3), 0..3);
        assert_eq!(page_window(2, 3), 0..2);
        assert_eq!(page_window(0, 3), 0..0);
        assert_eq!(page_window(10, 1), 0..1);
    }

    #[test]
    fn enforce_window_drops_late_pages_and_sorts() {
        let pages = vec![page(4), page(1), page(0), page(3), page(2)];
        let kept = enforce_page_window(pages, 3);
        let indices: Vec<usize> = kept.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn library_file_keeps_explicit_file() {
        let p = PathBuf::from("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(&p), p);
    }
}
