//! Input normalisation: decode the transport framing and pin down the media type.
//!
//! ## Detection chain
//!
//! 1. **Sniff** the bytes: `%PDF-` within the first KiB, or the image magic
//!    numbers known to the `image` crate.
//! 2. **Extension** of the declared filename.
//! 3. **Hint** supplied by the collaborator (e.g. the mime of a data URL).
//! 4. `application/octet-stream`, which is then rejected.
//!
//! Only PDF, PNG and JPEG pass. Rejection happens here, before any decoding
//! or rendering work is spent on the payload.

use crate::error::CertifyError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// How far into the payload the `%PDF-` marker may appear. Some producers
/// prepend junk bytes before the header; readers tolerate up to 1 KiB.
const PDF_MARKER_WINDOW: usize = 1024;

const OCTET_STREAM: &str = "application/octet-stream";

/// One uploaded certificate. Immutable once built.
#[derive(Debug, Clone)]
pub struct Submission {
    payload: Arc<[u8]>,
    filename: Option<String>,
    username: Option<String>,
    media_hint: Option<String>,
}

impl Submission {
    /// Build a submission from already-decoded bytes.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Arc::from(payload.into()),
            filename: None,
            username: None,
            media_hint: None,
        }
    }

    /// Build a submission from a base64 string or `data:` URL.
    ///
    /// The mime type of a data URL is kept as the media hint.
    pub fn from_encoded(encoded: &str) -> Result<Self, CertifyError> {
        let (hint, bytes) = decode_payload(encoded)?;
        let mut submission = Self::new(bytes);
        submission.media_hint = hint;
        Ok(submission)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_media_hint(mut self, mime: impl Into<String>) -> Self {
        self.media_hint = Some(mime.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub(crate) fn shared_payload(&self) -> Arc<[u8]> {
        Arc::clone(&self.payload)
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn media_hint(&self) -> Option<&str> {
        self.media_hint.as_deref()
    }
}

/// The accepted media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
}

impl MediaType {
    /// Map a mime string onto an accepted type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(MediaType::Pdf),
            "image/png" => Some(MediaType::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(MediaType::Jpeg),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }

    pub(crate) fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            MediaType::Pdf => None,
            MediaType::Png => Some(image::ImageFormat::Png),
            MediaType::Jpeg => Some(image::ImageFormat::Jpeg),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaType::Pdf => "pdf",
            MediaType::Png => "png",
            MediaType::Jpeg => "jpeg",
        })
    }
}

/// Which link of the detection chain decided the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Sniffed,
    Extension,
    Hint,
    Default,
}

/// Result of media detection for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub media_type: MediaType,
    pub source: DetectionSource,
}

impl MediaDescriptor {
    /// Canonical mime string of the detected type.
    pub fn mime(&self) -> &'static str {
        self.media_type.mime()
    }
}

/// Decode a base64 payload, optionally wrapped in a `data:<mime>;base64,` URL.
///
/// Returns the data-URL mime type (if any) and the raw bytes. Whitespace and
/// line breaks inside the base64 body are ignored.
pub fn decode_payload(encoded: &str) -> Result<(Option<String>, Vec<u8>), CertifyError> {
    let trimmed = encoded.trim();
    let (hint, body) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, body) = rest.split_once(',').ok_or_else(|| CertifyError::Decode {
                detail: "data URL has no ',' separator".into(),
            })?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| CertifyError::Decode {
                    detail: format!("data URL is not base64-encoded (header '{header}')"),
                })?;
            let mime = mime.split(';').next().unwrap_or_default().trim();
            let hint = (!mime.is_empty()).then(|| mime.to_ascii_lowercase());
            (hint, body)
        }
        None => (None, trimmed),
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| CertifyError::Decode {
        detail: format!("invalid base64: {e}"),
    })?;

    if bytes.is_empty() {
        return Err(CertifyError::Decode {
            detail: "payload is empty".into(),
        });
    }

    Ok((hint, bytes))
}

/// Determine the media type of `submission`, or reject it.
pub fn detect_media(submission: &Submission) -> Result<MediaDescriptor, CertifyError> {
    let (mime, source) = resolve_mime(submission);
    debug!("Media detection: {} via {:?}", mime, source);

    match MediaType::from_mime(&mime) {
        Some(media_type) => Ok(MediaDescriptor { media_type, source }),
        None => Err(CertifyError::UnsupportedMediaType {
            mime,
            filename: submission.filename().map(str::to_string),
        }),
    }
}

/// Walk the detection chain and return the first mime found.
fn resolve_mime(submission: &Submission) -> (String, DetectionSource) {
    if let Some(mime) = sniff(submission.payload()) {
        return (mime.to_string(), DetectionSource::Sniffed);
    }
    if let Some(mime) = submission.filename().and_then(guess_from_extension) {
        return (mime.to_string(), DetectionSource::Extension);
    }
    if let Some(hint) = submission.media_hint() {
        if !hint.trim().is_empty() {
            return (hint.trim().to_ascii_lowercase(), DetectionSource::Hint);
        }
    }
    (OCTET_STREAM.to_string(), DetectionSource::Default)
}

/// Magic-byte sniffing.
///
/// Image magic is anchored at offset 0 and checked first; the `%PDF-` marker
/// may sit anywhere in the first KiB, so it can also appear inside image
/// metadata.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type());
    }
    let window = &bytes[..bytes.len().min(PDF_MARKER_WINDOW)];
    window
        .windows(5)
        .any(|w| w == b"%PDF-")
        .then_some("application/pdf")
}

/// Map a filename extension onto a mime type.
pub fn guess_from_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}
