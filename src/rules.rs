//! Category rule tables.
//!
//! A [`RuleSet`] is an ordered list of [`CategoryRule`]s plus a default
//! category. Order is priority: the classification engine returns the first
//! rule with any matching pattern, so the most valuable / most specific
//! category goes first. Rule sets are immutable once built and are injected
//! through [`crate::config::ClassifierConfig::rules`]; the built-in table is
//! only the default value of that field.
//!
//! Tables can be written as JSON ([`RuleSpec`]):
//!
//! ```json
//! {
//!   "default": { "category": "Other", "points": 10 },
//!   "rules": [
//!     { "category": "NPTEL", "points": 50,
//!       "patterns": [ { "keyword": "nptel" }, { "regex": "swayam\\b" } ] }
//!   ]
//! }
//! ```

use crate::error::CertifyError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single match pattern. Both forms match case-insensitively.
///
/// Only [`Pattern::keyword`] and [`Pattern::regex`] construct one, so every
/// keyword is trimmed, lowercased and non-empty.
#[derive(Debug, Clone)]
pub struct Pattern(Matcher);

#[derive(Debug, Clone)]
enum Matcher {
    /// Substring match; stored lowercased.
    Keyword(String),
    /// Regular expression compiled with case-insensitivity enabled.
    Regex(Regex),
}

impl Pattern {
    /// Build a keyword pattern. Empty keywords would match everything and
    /// are rejected.
    pub fn keyword(keyword: &str) -> Result<Self, CertifyError> {
        let kw = keyword.trim().to_lowercase();
        if kw.is_empty() {
            return Err(CertifyError::InvalidConfig(
                "keyword patterns must not be empty".into(),
            ));
        }
        Ok(Pattern(Matcher::Keyword(kw)))
    }

    /// Compile a case-insensitive regex pattern.
    pub fn regex(pattern: &str) -> Result<Self, CertifyError> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|re| Pattern(Matcher::Regex(re)))
            .map_err(|e| CertifyError::InvalidConfig(format!("invalid regex '{pattern}': {e}")))
    }

    /// Test the pattern against text that is already lowercased.
    pub fn is_match(&self, lowered: &str) -> bool {
        match &self.0 {
            Matcher::Keyword(kw) => lowered.contains(kw.as_str()),
            Matcher::Regex(re) => re.is_match(lowered),
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self.0, Matcher::Keyword(_))
    }

    /// Source text of the pattern, for audit output.
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Matcher::Keyword(kw) => kw,
            Matcher::Regex(re) => re.as_str(),
        }
    }

    fn to_spec(&self) -> PatternSpec {
        match &self.0 {
            Matcher::Keyword(kw) => PatternSpec::Keyword(kw.clone()),
            Matcher::Regex(re) => PatternSpec::Regex(re.as_str().to_string()),
        }
    }
}

/// A named point bucket with an ordered pattern list.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: String,
    pub points: u32,
    pub patterns: Vec<Pattern>,
}

impl CategoryRule {
    /// First pattern in list order that matches `lowered`.
    pub fn first_match(&self, lowered: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.is_match(lowered))
    }
}

/// Priority-ordered rule table plus the fallback category.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    default_category: String,
    default_points: u32,
}

impl RuleSet {
    /// Build a rule set, validating every rule.
    pub fn new(
        rules: Vec<CategoryRule>,
        default_category: impl Into<String>,
        default_points: u32,
    ) -> Result<Self, CertifyError> {
        let default_category = default_category.into();
        if default_category.trim().is_empty() {
            return Err(CertifyError::InvalidConfig(
                "default category name must not be empty".into(),
            ));
        }
        for rule in &rules {
            if rule.category.trim().is_empty() {
                return Err(CertifyError::InvalidConfig(
                    "category names must not be empty".into(),
                ));
            }
            if rule.patterns.is_empty() {
                return Err(CertifyError::InvalidConfig(format!(
                    "category '{}' has no patterns",
                    rule.category
                )));
            }
        }
        Ok(Self {
            rules,
            default_category,
            default_points,
        })
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn default_points(&self) -> u32 {
        self.default_points
    }

    /// Compile a [`RuleSpec`] into a rule set.
    pub fn from_spec(spec: &RuleSpec) -> Result<Self, CertifyError> {
        let rules = spec
            .rules
            .iter()
            .map(|r| {
                let patterns = r
                    .patterns
                    .iter()
                    .map(|p| match p {
                        PatternSpec::Keyword(k) => Pattern::keyword(k),
                        PatternSpec::Regex(re) => Pattern::regex(re),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CategoryRule {
                    category: r.category.clone(),
                    points: r.points,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, CertifyError>>()?;

        Self::new(rules, spec.default.category.clone(), spec.default.points)
    }

    /// Parse a JSON rule table.
    pub fn from_json(json: &str) -> Result<Self, CertifyError> {
        let spec: RuleSpec = serde_json::from_str(json)
            .map_err(|e| CertifyError::InvalidConfig(format!("rule table: {e}")))?;
        Self::from_spec(&spec)
    }

    /// Load a JSON rule table from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CertifyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CertifyError::InputUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    /// Serialisable form of this rule set.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            default: DefaultSpec {
                category: self.default_category.clone(),
                points: self.default_points,
            },
            rules: self
                .rules
                .iter()
                .map(|r| RuleEntrySpec {
                    category: r.category.clone(),
                    points: r.points,
                    patterns: r.patterns.iter().map(Pattern::to_spec).collect(),
                })
                .collect(),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

// ── Serialisable form ────────────────────────────────────────────────────

/// JSON shape of a rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub default: DefaultSpec,
    pub rules: Vec<RuleEntrySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSpec {
    pub category: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntrySpec {
    pub category: String,
    pub points: u32,
    pub patterns: Vec<PatternSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSpec {
    Keyword(String),
    Regex(String),
}

// ── Built-in table ───────────────────────────────────────────────────────

pub const NPTEL: &str = "NPTEL";
pub const HACKATHON: &str = "Hackathon/Competition";
pub const INTERNSHIP: &str = "Internship";
pub const PROFESSIONAL_DEVELOPMENT: &str = "Professional Development";
pub const OTHER: &str = "Other";

fn builtin_spec() -> RuleSpec {
    use PatternSpec::{Keyword, Regex};
    let kw = |s: &str| Keyword(s.to_string());
    let re = |s: &str| Regex(s.to_string());

    RuleSpec {
        default: DefaultSpec {
            category: OTHER.into(),
            points: 10,
        },
        rules: vec![
            RuleEntrySpec {
                category: NPTEL.into(),
                points: 50,
                patterns: vec![
                    kw("nptel"),
                    re(r"national\s+programme\s+on\s+technology\s+enhanced\s+learning"),
                    kw("swayam"),
                ],
            },
            RuleEntrySpec {
                category: HACKATHON.into(),
                points: 40,
                patterns: vec![
                    kw("hackathon"),
                    kw("competition"),
                    kw("contest"),
                    re(r"\b(1st|2nd|3rd|first|second|third)\s+(prize|place)\b"),
                    kw("winner"),
                    re(r"runners?[\s-]+up"),
                ],
            },
            RuleEntrySpec {
                category: INTERNSHIP.into(),
                points: 30,
                patterns: vec![
                    kw("internship"),
                    re(r"\bintern\b"),
                    kw("industrial training"),
                ],
            },
            RuleEntrySpec {
                category: PROFESSIONAL_DEVELOPMENT.into(),
                points: 20,
                patterns: vec![
                    kw("workshop"),
                    kw("seminar"),
                    kw("webinar"),
                    kw("bootcamp"),
                    kw("training program"),
                    kw("online course"),
                    kw("coursera"),
                    kw("udemy"),
                ],
            },
        ],
    }
}

static DEFAULT_RULES: Lazy<RuleSet> =
    Lazy::new(|| RuleSet::from_spec(&builtin_spec()).expect("built-in rule table is valid"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_priority_order() {
        let rules = RuleSet::default();
        let names: Vec<&str> = rules.rules().iter().map(|r| r.category.as_str()).collect();
        assert_eq!(
            names,
            vec![NPTEL, HACKATHON, INTERNSHIP, PROFESSIONAL_DEVELOPMENT]
        );
        let points: Vec<u32> = rules.rules().iter().map(|r| r.points).collect();
        assert_eq!(points, vec![50, 40, 30, 20]);
        assert_eq!(rules.default_category(), OTHER);
        assert_eq!(rules.default_points(), 10);
    }

    #[test]
    fn regex_is_case_insensitive() {
        let p = Pattern::regex(r"first\s+prize").unwrap();
        assert!(p.is_match("won FIRST   Prize"));
    }

    #[test]
    fn keyword_is_lowercased() {
        let p = Pattern::keyword("  NPTEL ").unwrap();
        assert_eq!(p.as_str(), "nptel");
        assert!(p.is_match("an nptel course"));
    }

    #[test]
    fn uppercase_keyword_matches_lowered_text() {
        let p = Pattern::keyword("HACKATHON").unwrap();
        assert!(p.is_keyword());
        assert!(p.is_match("winner of the annual hackathon"));

        let rules = RuleSet::new(
            vec![CategoryRule {
                category: "Hack".into(),
                points: 5,
                patterns: vec![p],
            }],
            "Other",
            1,
        )
        .unwrap();
        assert!(rules.rules()[0].first_match("hackathon finalist").is_some());
    }

    #[test]
    fn blank_keyword_in_json_rejected() {
        let json = r#"{"default":{"category":"Other","points":5},
            "rules":[{"category":"X","points":1,"patterns":[{"keyword":"  "}]}]}"#;
        assert!(matches!(
            RuleSet::from_json(json),
            Err(CertifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_keyword_rejected() {
        assert!(matches!(
            Pattern::keyword("   "),
            Err(CertifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_regex_rejected() {
        let json = r#"{"default":{"category":"Other","points":5},
            "rules":[{"category":"X","points":1,"patterns":[{"regex":"(unclosed"}]}]}"#;
        let err = RuleSet::from_json(json).unwrap_err();
        assert!(err.to_string().contains("invalid regex"), "got: {err}");
    }

    #[test]
    fn rule_without_patterns_rejected() {
        let json = r#"{"default":{"category":"Other","points":5},
            "rules":[{"category":"Empty","points":1,"patterns":[]}]}"#;
        let err = RuleSet::from_json(json).unwrap_err();
        assert!(err.to_string().contains("no patterns"));
    }

    #[test]
    fn json_table_loads_in_order() {
        let json = r#"{
            "default": {"category": "Misc", "points": 1},
            "rules": [
                {"category": "Sports", "points": 15, "patterns": [{"keyword": "marathon"}]},
                {"category": "Arts", "points": 12, "patterns": [{"regex": "paint(ing)?"}]}
            ]
        }"#;
        let rules = RuleSet::from_json(json).unwrap();
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(rules.rules()[0].category, "Sports");
        assert_eq!(rules.default_category(), "Misc");
        assert!(rules.rules()[1].first_match("oil painting").is_some());
    }

    #[test]
    fn spec_survives_export_and_reload() {
        let spec = RuleSet::default().to_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let reloaded = RuleSet::from_json(&json).unwrap();
        assert_eq!(reloaded.to_spec(), spec);
    }

    #[test]
    fn from_json_file_missing_is_unreadable() {
        let err = RuleSet::from_json_file("/nonexistent/rules.json").unwrap_err();
        assert!(matches!(err, CertifyError::InputUnreadable { .. }));
    }
}
