//! Heuristic classification: does this transcription come from a SIM
//! (Indonesian driving permit)?
//!
//! OCR output is noisy, so no single rule is trustworthy. Three signals are
//! gathered from the normalised text and combined by a named policy:
//!
//! | Signal | Permissive | Corroborated |
//! |--------|------------|--------------|
//! | permit phrase | "surat izin mengemudi", or the standalone token "sim" | same, plus "surat izin" |
//! | issuing authority | "republik indonesia" | "indonesia" |
//! | national ID | exactly 16 ASCII digits between non-digits | same |
//!
//! * [`ClassificationPolicy::Permissive`]: `permit` (or `authority`, when
//!   `country_alone_suffices` is set). Maximises recall.
//! * [`ClassificationPolicy::Corroborated`]: `(permit AND authority) OR
//!   national_id`. Fewer false positives; may miss scans where OCR garbled
//!   one of the two phrases.
//!
//! The "sim" token must stand alone: it never matches inside a longer word
//! such as "menyimpan" or "simpan". Word boundaries are ASCII-only, so an
//! OCR artefact like "ñsim" or "simé" still counts as a standalone token.

use crate::error::SimOcrError;
use crate::pipeline::normalize::{normalize, NormalizedText};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Full name of the document.
const FULL_PHRASE: &str = "surat izin mengemudi";

/// Shortened phrase accepted by the corroborated policy.
const SHORT_PHRASE: &str = "surat izin";

/// Issuing-authority mention printed on the permit header.
const AUTHORITY_PHRASE: &str = "republik indonesia";

/// Bare country name accepted by the corroborated policy.
const COUNTRY_NAME: &str = "indonesia";

static RE_SIM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u:\b)sim(?-u:\b)").unwrap());

static RE_NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])[0-9]{16}(?:[^0-9]|$)").unwrap());

/// A named rule set mapping normalised text to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Any single permit signal suffices.
    Permissive,
    /// Permit phrase and country mention must co-occur, unless a
    /// national-ID-shaped number is present. (default)
    #[default]
    Corroborated,
}

impl fmt::Display for ClassificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClassificationPolicy::Permissive => "permissive",
            ClassificationPolicy::Corroborated => "corroborated",
        })
    }
}

impl FromStr for ClassificationPolicy {
    type Err = SimOcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permissive" | "a" => Ok(ClassificationPolicy::Permissive),
            "corroborated" | "b" => Ok(ClassificationPolicy::Corroborated),
            other => Err(SimOcrError::InvalidConfig(format!(
                "unknown classification policy '{other}' (expected permissive or corroborated)"
            ))),
        }
    }
}

/// Independent boolean signals found in the normalised text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassificationEvidence {
    pub has_permit_phrase: bool,
    pub has_issuing_authority_mention: bool,
    pub has_national_id_pattern: bool,
}

impl ClassificationEvidence {
    /// Gather every signal using the vocabulary of `policy`.
    pub fn gather(text: &NormalizedText, policy: ClassificationPolicy) -> Self {
        let sim_token = RE_SIM_TOKEN.is_match(text.as_str());
        let (has_permit_phrase, has_issuing_authority_mention) = match policy {
            ClassificationPolicy::Permissive => (
                text.contains(FULL_PHRASE) || sim_token,
                text.contains(AUTHORITY_PHRASE),
            ),
            ClassificationPolicy::Corroborated => (
                text.contains(FULL_PHRASE) || text.contains(SHORT_PHRASE) || sim_token,
                text.contains(COUNTRY_NAME),
            ),
        };

        Self {
            has_permit_phrase,
            has_issuing_authority_mention,
            has_national_id_pattern: has_national_id(text),
        }
    }
}

/// Whether `text` holds a standalone run of exactly 16 ASCII digits.
pub fn has_national_id(text: &NormalizedText) -> bool {
    RE_NATIONAL_ID.is_match(text.as_str())
}

/// The externally visible result of classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub detected: bool,
    /// The transcription exactly as the engine returned it.
    pub text: String,
    pub policy: ClassificationPolicy,
    pub evidence: ClassificationEvidence,
}

/// A configured policy, ready to classify transcriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classifier {
    policy: ClassificationPolicy,
    country_alone_suffices: bool,
}

impl Classifier {
    pub fn new(policy: ClassificationPolicy) -> Self {
        Self {
            policy,
            country_alone_suffices: false,
        }
    }

    /// Let a bare "republik indonesia" mention detect under the permissive
    /// policy. No effect on the corroborated policy.
    pub fn country_alone_suffices(mut self, v: bool) -> Self {
        self.country_alone_suffices = v;
        self
    }

    pub fn policy(&self) -> ClassificationPolicy {
        self.policy
    }

    /// Combine evidence into a detection decision.
    pub fn decide(&self, e: &ClassificationEvidence) -> bool {
        match self.policy {
            ClassificationPolicy::Permissive => {
                e.has_permit_phrase
                    || (self.country_alone_suffices && e.has_issuing_authority_mention)
            }
            ClassificationPolicy::Corroborated => {
                (e.has_permit_phrase && e.has_issuing_authority_mention)
                    || e.has_national_id_pattern
            }
        }
    }

    /// Classify a raw transcription. Never fails; empty text is not detected.
    pub fn classify(&self, text: &str) -> ClassificationVerdict {
        let normalized = normalize(Some(text));
        let evidence = ClassificationEvidence::gather(&normalized, self.policy);
        ClassificationVerdict {
            detected: self.decide(&evidence),
            text: text.to_string(),
            policy: self.policy,
            evidence,
        }
    }
}

/// Classify `text` under `policy` with default options.
pub fn classify(text: &str, policy: ClassificationPolicy) -> ClassificationVerdict {
    Classifier::new(policy).classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use ClassificationPolicy::{Corroborated, Permissive};

    #[test]
    fn corroborated_full_header_detects() {
        let v = classify("SURAT IZIN MENGEMUDI REPUBLIK INDONESIA", Corroborated);
        assert!(v.detected);
        assert!(v.evidence.has_permit_phrase);
        assert!(v.evidence.has_issuing_authority_mention);
    }

    #[test]
    fn corroborated_ignores_sim_inside_words() {
        assert!(!classify("saya menyimpan barang di rumah", Corroborated).detected);
        // Even with the country present, "menyimpan" is not a permit phrase.
        let v = classify("menyimpan di indonesia", Corroborated);
        assert!(!v.evidence.has_permit_phrase);
        assert!(!v.detected);
    }

    #[test]
    fn corroborated_national_id_alone_detects() {
        let v = classify("nomor 1234567890123456 terdaftar", Corroborated);
        assert!(v.detected);
        assert!(!v.evidence.has_permit_phrase);
        assert!(v.evidence.has_national_id_pattern);
    }

    #[test]
    fn corroborated_needs_both_phrase_and_country() {
        assert!(!classify("SIM", Corroborated).detected);
        assert!(!classify("Republik Indonesia", Corroborated).detected);
        assert!(classify("SIM Indonesia", Corroborated).detected);
        assert!(classify("surat izin usaha - indonesia", Corroborated).detected);
    }

    #[test]
    fn permissive_country_alone_does_not_detect_by_default() {
        let v = classify("Republik Indonesia", Permissive);
        assert!(!v.detected);
        assert!(v.evidence.has_issuing_authority_mention);
    }

    #[test]
    fn permissive_country_alone_when_enabled() {
        let c = Classifier::new(Permissive).country_alone_suffices(true);
        assert!(c.classify("Republik Indonesia").detected);
        // The option means nothing to the corroborated policy.
        let c = Classifier::new(Corroborated).country_alone_suffices(true);
        assert!(!c.classify("Republik Indonesia").detected);
    }

    #[test]
    fn permissive_bare_sim_token_detects() {
        assert!(classify("SIM Jakarta", Permissive).detected);
        assert!(classify("(sim)", Permissive).detected);
        assert!(classify("sim", Permissive).detected);
        assert!(!classify("simpan", Permissive).detected);
        assert!(!classify("sim_card", Permissive).detected);
    }

    #[test]
    fn sim_token_boundaries_are_ascii() {
        assert!(classify("ñsim", Permissive).detected);
        assert!(classify("SIMÉ", Permissive).detected);
        assert!(!classify("nomor sim2", Permissive).detected);
    }

    #[test]
    fn permissive_ignores_national_id() {
        let v = classify("1234567890123456", Permissive);
        assert!(v.evidence.has_national_id_pattern);
        assert!(!v.detected);
    }

    #[test]
    fn national_id_must_be_exactly_sixteen_digits() {
        let n = |s: &str| has_national_id(&normalize(Some(s)));
        assert!(n("1234567890123456"));
        assert!(n("nik:1234567890123456."));
        assert!(n("a1234567890123456b"));
        assert!(!n("123456789012345")); // 15
        assert!(!n("12345678901234567")); // 17
        assert!(!n("nik 1234 5678 9012 3456"));
        assert!(!n("١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦")); // non-ASCII digits
    }

    #[test]
    fn empty_text_is_never_detected() {
        for policy in [Permissive, Corroborated] {
            let v = classify("", policy);
            assert!(!v.detected);
            assert_eq!(v.evidence, ClassificationEvidence::default());
        }
    }

    #[test]
    fn verdict_keeps_original_text() {
        let raw = "REPUBLIK INDONESIA\nSURAT IZIN MENGEMUDI\n";
        let v = classify(raw, Permissive);
        assert_eq!(v.text, raw);
        assert_eq!(v.policy, Permissive);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("permissive".parse::<ClassificationPolicy>().unwrap(), Permissive);
        assert_eq!(" B ".parse::<ClassificationPolicy>().unwrap(), Corroborated);
        assert!("strict".parse::<ClassificationPolicy>().is_err());
        assert_eq!(Permissive.to_string(), "permissive");
    }

    proptest! {
        #[test]
        fn classification_is_case_insensitive(t in "[a-zA-Z0-9 ]{0,60}") {
            for policy in [Permissive, Corroborated] {
                let lower = classify(&t.to_lowercase(), policy);
                let upper = classify(&t.to_uppercase(), policy);
                prop_assert_eq!(lower.detected, upper.detected);
                prop_assert_eq!(lower.evidence, upper.evidence);
            }
        }
    }
}
