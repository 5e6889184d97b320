//! Text aggregation: merge per-variant fragments into one text blob.
//!
//! OCR jobs finish in arbitrary order. Fragments are first put into canonical
//! order (page index, then technique order) so the aggregate never depends on
//! which variant happened to finish first; then short fragments are dropped,
//! exact duplicates removed, and the survivors joined with single spaces.

use crate::pipeline::ocr::TextFragment;
use std::collections::HashSet;

/// Deduplicated union of all retained fragments of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregatedText {
    pub text: String,
    /// Fragments that contributed text.
    pub fragments_kept: usize,
    /// Fragments discarded as noise (too short) or as exact duplicates.
    pub fragments_dropped: usize,
}

impl AggregatedText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Character count of the aggregated text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Aggregate fragments, keeping those longer than `min_fragment_len` chars.
pub fn aggregate(mut fragments: Vec<TextFragment>, min_fragment_len: usize) -> AggregatedText {
    fragments.sort_by_key(|f| (f.page, f.technique));
    let total = fragments.len();

    let retained = fragments
        .iter()
        .filter(|f| f.len() > min_fragment_len)
        .map(|f| f.text.as_str());

    let (text, kept) = dedup_join_counted(retained);

    AggregatedText {
        text,
        fragments_kept: kept,
        fragments_dropped: total - kept,
    }
}

/// Join strings with a single space, dropping exact repeats and keeping the
/// first occurrence of each.
///
/// `["abc", "abc", "def"]` and `["abc", "def"]` both yield `"abc def"`.
pub fn dedup_join<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    dedup_join_counted(texts).0
}

fn dedup_join_counted<'a>(texts: impl IntoIterator<Item = &'a str>) -> (String, usize) {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = texts.into_iter().filter(|t| seen.insert(*t)).collect();
    (unique.join(" "), unique.len())
}
