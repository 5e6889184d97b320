//! Progress-callback trait for per-stage classification events.
//!
//! Inject an [`Arc<dyn ClassificationProgressCallback>`] via
//! [`crate::config::ClassifierConfigBuilder::progress_callback`] to observe a
//! submission moving through the pipeline:
//!
//! ```text
//! Received → Decoded → (Rasterized) → Preprocessed → Extracted → Validated → Classified
//! ```
//!
//! Every submission ends in exactly one of [`on_complete`] or [`on_failure`].
//! Stages never re-enter and are never retried.
//!
//! [`on_complete`]: ClassificationProgressCallback::on_complete
//! [`on_failure`]: ClassificationProgressCallback::on_failure
//!
//! # Example
//!
//! ```rust
//! use certify_points::{ClassificationProgressCallback, ClassifierConfig, Stage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl ClassificationProgressCallback for StageLogger {
//!     fn on_stage(&self, stage: Stage) {
//!         eprintln!("reached {stage}");
//!     }
//! }
//!
//! let config = ClassifierConfig::builder()
//!     .progress_callback(Arc::new(StageLogger))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ErrorKind;
use crate::output::ClassificationResult;
use crate::pipeline::preprocess::Technique;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A pipeline state a submission passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Decoded,
    Rasterized,
    Preprocessed,
    Extracted,
    Validated,
    Classified,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Decoded => "decoded",
            Stage::Rasterized => "rasterized",
            Stage::Preprocessed => "preprocessed",
            Stage::Extracted => "extracted",
            Stage::Validated => "validated",
            Stage::Classified => "classified",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as a submission advances.
///
/// Implementations must be `Send + Sync`: variant events fire from the
/// fan-in of concurrently running OCR jobs. All methods default to no-ops.
pub trait ClassificationProgressCallback: Send + Sync {
    /// Called when the submission enters `stage`.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when one variant produced text (before length filtering).
    ///
    /// # Arguments
    /// * `page`: 0-indexed page
    /// * `technique`: preprocessing technique of the variant
    /// * `chars`: character count of the cleaned OCR text
    fn on_variant_complete(&self, page: usize, technique: Technique, chars: usize) {
        let _ = (page, technique, chars);
    }

    /// Called when one variant failed in preprocessing or OCR.
    fn on_variant_error(&self, page: usize, technique: Technique, error: &str) {
        let _ = (page, technique, error);
    }

    /// Terminal state `Completed`.
    fn on_complete(&self, result: &ClassificationResult) {
        let _ = result;
    }

    /// Terminal state `Failed(kind)`.
    fn on_failure(&self, kind: ErrorKind, detail: &str) {
        let _ = (kind, detail);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ClassificationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClassifierConfig`].
pub type ProgressCallback = Arc<dyn ClassificationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        variants: AtomicUsize,
        errors: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ClassificationProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_variant_complete(&self, _page: usize, _technique: Technique, _chars: usize) {
            self.variants.fetch_add(1, Ordering::SeqCst);
        }

        fn on_variant_error(&self, _page: usize, _technique: Technique, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_failure(&self, _kind: ErrorKind, _detail: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Received);
        cb.on_variant_complete(0, Technique::Original, 42);
        cb.on_variant_error(0, Technique::Binarize, "boom");
        cb.on_failure(ErrorKind::ValidationFailure, "too short");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            stages: Mutex::new(Vec::new()),
            variants: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        };

        tracker.on_stage(Stage::Received);
        tracker.on_stage(Stage::Decoded);
        tracker.on_variant_complete(0, Technique::Original, 120);
        tracker.on_variant_complete(0, Technique::Grayscale, 118);
        tracker.on_variant_error(0, Technique::AdaptiveDenoise, "too large");
        tracker.on_failure(ErrorKind::ExtractionFailure, "nothing");

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Received, Stage::Decoded]
        );
        assert_eq!(tracker.variants.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Received < Stage::Decoded);
        assert!(Stage::Extracted < Stage::Validated);
        assert_eq!(Stage::Preprocessed.to_string(), "preprocessed");
    }
}
