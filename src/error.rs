//! Error types for the sim-ocr library.
//!
//! Every stage of the scan pipeline fails fast: there is no partial or
//! degraded verdict. A single enum, [`SimOcrError`], therefore covers the
//! whole pipeline, grouped by the stage that raises it.
//!
//! Callers that need to pick a response (an HTTP status, a CLI exit code)
//! use [`SimOcrError::class`], which folds the variants into the three
//! failure classes the outer surfaces care about.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sim-ocr library.
#[derive(Debug, Error)]
pub enum SimOcrError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// No image was supplied, the payload was empty, or it could not be decoded.
    #[error("{reason}")]
    InvalidInput { reason: String },

    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR engine ran but reported a failure (corrupt image, unsupported
    /// format, internal engine error).
    #[error("Recognition failed: {detail}")]
    RecognitionFailed { detail: String },

    /// The OCR engine did not finish within the configured timeout.
    #[error("Recognition timed out after {secs}s")]
    RecognitionTimeout { secs: u64 },

    /// The OCR engine could not be started at all.
    #[error("OCR engine '{engine}' is not available: {detail}\nInstall tesseract or pass --tesseract <PATH>.")]
    EngineUnavailable { engine: String, detail: String },

    /// The language model for the engine could not be located or downloaded.
    #[error("Language model '{language}' is unavailable: {detail}")]
    ModelUnavailable { language: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class used to choose an outward response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller supplied nothing usable; OCR was never attempted.
    Input,
    /// Recognition was attempted and failed.
    Recognition,
    /// Anything else.
    Unexpected,
}

impl SimOcrError {
    /// Shorthand for [`SimOcrError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SimOcrError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// The failure class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SimOcrError::InvalidInput { .. } | SimOcrError::FileNotFound { .. } => {
                ErrorClass::Input
            }
            SimOcrError::RecognitionFailed { .. }
            | SimOcrError::RecognitionTimeout { .. }
            | SimOcrError::EngineUnavailable { .. }
            | SimOcrError::ModelUnavailable { .. } => ErrorClass::Recognition,
            SimOcrError::InvalidConfig(_) | SimOcrError::Internal(_) => ErrorClass::Unexpected,
        }
    }
}
