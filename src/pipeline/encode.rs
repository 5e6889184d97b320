//! Image encoding: `DynamicImage` → PNG bytes for engines that read files.
//!
//! The tesseract executable and `TessBaseAPI::SetImage` via leptonica both
//! take an encoded image rather than a raw pixel buffer. PNG is lossless:
//! JPEG ringing around glyph edges measurably hurts recognition, and the
//! binarised variants compress to almost nothing as PNG anyway.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image variant as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn encode_gray_variant() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([255])));
        let data = encode_png(&img).expect("encode should succeed");
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&data).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }
}
