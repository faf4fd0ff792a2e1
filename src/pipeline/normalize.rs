//! Text normalisation: the canonical form every heuristic matches against.
//!
//! Deliberately minimal. OCR output is lower-cased and stripped of leading
//! and trailing whitespace, nothing more: internal whitespace, punctuation and
//! line breaks survive because the classifier's token and digit-run rules
//! depend on them to find boundaries.

use std::fmt;

/// Lower-cased, edge-trimmed projection of a transcription.
///
/// Only [`normalize`] constructs one, so holding a `NormalizedText` proves the
/// text has been canonicalised.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring test against the canonical text. `needle` must already be
    /// lower-case.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalise a transcription. Missing text normalises to the empty string.
pub fn normalize(text: Option<&str>) -> NormalizedText {
    NormalizedText(text.unwrap_or_default().to_lowercase().trim().to_string())
}
