//! Output types for a completed scan.

use crate::pipeline::classify::ClassificationVerdict;
use crate::pipeline::intake::ImageInfo;
use serde::Serialize;

/// The result of scanning one document image.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutput {
    /// Detection decision, evidence, and the unmodified transcription.
    pub verdict: ClassificationVerdict,

    /// What was scanned.
    pub image: ImageInfo,

    pub stats: ScanStats,
}

impl ScanOutput {
    pub fn detected(&self) -> bool {
        self.verdict.detected
    }

    pub fn text(&self) -> &str {
        &self.verdict.text
    }
}

/// Timing and engine details for one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Name reported by the engine, e.g. `tesseract`.
    pub engine: String,
    /// Language spec the engine was asked to use.
    pub language: String,
    /// Time spent inside the engine (ms).
    pub recognition_ms: u64,
    /// Wall-clock time from accepted image to verdict (ms).
    pub total_ms: u64,
}
