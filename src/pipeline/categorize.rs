//! Classification engine: first matching category wins.
//!
//! Rules are walked in priority order and, within a rule, patterns in list
//! order. The first hit decides the category; there is no scoring and no
//! tie-breaking by match count, so a certificate mentioning both "nptel" and
//! "hackathon" always lands in whichever category is listed first. When
//! nothing matches the rule set's default category is returned. This step
//! cannot fail.

use crate::output::ClassificationResult;
use crate::rules::RuleSet;
use tracing::debug;

/// Classify validated text against `rules`.
pub fn categorize(text: &str, rules: &RuleSet) -> ClassificationResult {
    let lowered = text.to_lowercase();

    for rule in rules.rules() {
        if let Some(pattern) = rule.first_match(&lowered) {
            debug!(
                "Matched category '{}' via pattern '{}'",
                rule.category,
                pattern.as_str()
            );
            return ClassificationResult {
                category: rule.category.clone(),
                points: rule.points,
                matched_pattern: Some(pattern.as_str().to_string()),
            };
        }
    }

    debug!("No rule matched; using default '{}'", rules.default_category());
    ClassificationResult {
        category: rules.default_category().to_string(),
        points: rules.default_points(),
        matched_pattern: None,
    }
}
