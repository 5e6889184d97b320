//! Plausibility gate between extraction and classification.
//!
//! Garbage OCR (a photo of a desk, a screenshot of a chat) would otherwise
//! fall through to the default category and earn baseline points. Text must
//! be long enough and must mention at least a couple of the words that
//! nearly every certificate carries.

use crate::error::ValidationFailure;

/// Words that nearly every certificate carries.
pub const DEFAULT_INDICATORS: [&str; 6] = [
    "certificate",
    "completion",
    "awarded",
    "verified",
    "recognized",
    "participation",
];

/// Thresholds for [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Inclusive minimum length in characters. Default: 50.
    pub min_text_len: usize,
    /// Minimum number of distinct indicators present. Default: 2.
    pub min_indicators: usize,
    /// Indicator keywords, matched as case-insensitive substrings.
    pub indicators: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_text_len: 50,
            min_indicators: 2,
            indicators: DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Check `text` against `policy`; on success return the indicators found.
///
/// Length is checked first, so short text fails as `TooShort` whatever it
/// contains.
pub fn validate(text: &str, policy: &ValidationPolicy) -> Result<Vec<String>, ValidationFailure> {
    let len = text.chars().count();
    if len < policy.min_text_len {
        return Err(ValidationFailure::TooShort {
            len,
            min: policy.min_text_len,
        });
    }

    let lowered = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for indicator in &policy.indicators {
        let ind = indicator.to_lowercase();
        if !ind.is_empty() && lowered.contains(&ind) && !found.contains(&ind) {
            found.push(ind);
        }
    }

    if found.len() < policy.min_indicators {
        return Err(ValidationFailure::TooFewIndicators {
            found,
            required: policy.min_indicators,
        });
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pad `base` with filler to exactly `len` characters.
    fn padded(base: &str, len: usize) -> String {
        let mut s = base.to_string();
        while s.chars().count() < len {
            s.push('x');
        }
        s
    }

    #[test]
    fn short_text_fails_regardless_of_indicators() {
        let text = "certificate completion awarded verified";
        assert!(text.len() < 50);
        let err = validate(text, &ValidationPolicy::default()).unwrap_err();
        assert!(matches!(err, ValidationFailure::TooShort { min: 50, .. }));
    }

    #[test]
    fn boundary_49_fails_50_passes() {
        let policy = ValidationPolicy::default();
        let base = "certificate of completion ";
        assert!(matches!(
            validate(&padded(base, 49), &policy),
            Err(ValidationFailure::TooShort { len: 49, .. })
        ));
        let found = validate(&padded(base, 50), &policy).unwrap();
        assert_eq!(found, vec!["certificate", "completion"]);
    }

    #[test]
    fn one_indicator_is_not_enough() {
        let text = padded("certificate issued to a student of the college ", 60);
        let err = validate(&text, &ValidationPolicy::default()).unwrap_err();
        match err {
            ValidationFailure::TooFewIndicators { found, required } => {
                assert_eq!(found, vec!["certificate"]);
                assert_eq!(required, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn indicators_are_case_insensitive() {
        let text = padded("CERTIFICATE of PARTICIPATION in the annual meet ", 60);
        let found = validate(&text, &ValidationPolicy::default()).unwrap();
        assert_eq!(found, vec!["certificate", "participation"]);
    }

    #[test]
    fn repeated_indicator_counts_once() {
        let text = padded("certificate certificate certificate certificate ", 60);
        assert!(validate(&text, &ValidationPolicy::default()).is_err());
    }

    #[test]
    fn stricter_boundary_is_configurable() {
        let policy = ValidationPolicy {
            min_text_len: 51,
            ..ValidationPolicy::default()
        };
        let text = padded("certificate of completion ", 50);
        assert!(validate(&text, &policy).is_err());
    }

    #[test]
    fn thirty_chars_without_indicators_fails() {
        let text = padded("random photo of a desk ", 30);
        assert!(matches!(
            validate(&text, &ValidationPolicy::default()),
            Err(ValidationFailure::TooShort { len: 30, .. })
        ));
    }
}
