//! Result types returned to collaborators.
//!
//! [`ClassificationOutput`] and [`FailureReport`] are the boundary objects:
//! serialise them (JSON, camelCase) and hand them to whatever transport sits
//! in front of the library.

use crate::error::{CertifyError, ErrorKind};
use crate::pipeline::input::{DetectionSource, MediaType};
use serde::{Deserialize, Serialize};

/// Winning category and its points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: String,
    pub points: u32,
    /// Pattern that decided the category; `None` for the default category.
    pub matched_pattern: Option<String>,
}

/// Successful classification of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationOutput {
    pub category: String,
    pub points: u32,
    /// Passed through untouched from the submission.
    pub username: Option<String>,
    pub matched_pattern: Option<String>,
    pub stats: PipelineStats,
}

impl ClassificationOutput {
    pub fn result(&self) -> ClassificationResult {
        ClassificationResult {
            category: self.category.clone(),
            points: self.points,
            matched_pattern: self.matched_pattern.clone(),
        }
    }
}

/// Per-submission processing statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub media_type: MediaType,
    pub detected_by: DetectionSource,
    /// Pages that went through preprocessing (1 for images).
    pub pages: usize,
    /// Variants handed to OCR.
    pub variants: usize,
    /// Techniques or OCR calls that failed.
    pub variants_failed: usize,
    pub fragments_kept: usize,
    pub fragments_dropped: usize,
    /// Character length of the aggregated text.
    pub text_chars: usize,
    pub indicators_found: Vec<String>,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
}

/// Failed classification: an error kind, a human-readable detail, no points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub error_kind: ErrorKind,
    pub detail: String,
    pub points: u32,
    pub username: Option<String>,
}

impl FailureReport {
    pub fn new(error: &CertifyError, username: Option<&str>) -> Self {
        Self {
            error_kind: error.kind(),
            detail: error.to_string(),
            points: 0,
            username: username.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationFailure;

    #[test]
    fn failure_report_awards_zero_points() {
        let err: CertifyError = ValidationFailure::TooShort { len: 30, min: 50 }.into();
        let report = FailureReport::new(&err, Some("ravi"));
        assert_eq!(report.error_kind, ErrorKind::ValidationFailure);
        assert_eq!(report.points, 0);
        assert_eq!(report.username.as_deref(), Some("ravi"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorKind"], "ValidationFailure");
        assert_eq!(json["points"], 0);
    }

    #[test]
    fn result_serialises_camel_case() {
        let r = ClassificationResult {
            category: "NPTEL".into(),
            points: 50,
            matched_pattern: Some("nptel".into()),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["matchedPattern"], "nptel");
    }
}
