//! # sim-ocr
//!
//! Detect Indonesian driving permits (SIM, *Surat Izin Mengemudi*) in scanned
//! or photographed document images.
//!
//! ## How it decides
//!
//! There is no layout model and no trained classifier. The image goes through
//! an OCR engine (tesseract) and the transcription is matched against a few
//! textual signals: the permit's name, a mention of the issuing country, and a
//! 16-digit national ID number. A named [`ClassificationPolicy`] combines the
//! signals. The permissive policy takes any permit signal, while the
//! corroborated policy wants the name and the country together (or a national
//! ID on its own).
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (base64 / upload / file)
//!  │
//!  ├─ 1. Intake      reject empty input before any OCR work
//!  ├─ 2. OCR         one tesseract worker per request, released on every path
//!  ├─ 3. Normalise   lower-case, trim
//!  ├─ 4. Classify    evidence + policy → verdict
//!  └─ 5. Respond     { text, simDetected } or { success, detected, text }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sim_ocr::{scan_file, ScanConfig, TesseractEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::default();
//!     // Downloads eng.traineddata on first use.
//!     let engine = TesseractEngine::prepare(&config, None).await?;
//!     let output = scan_file("sim.jpg", &engine, &config).await?;
//!     println!("detected: {}", output.detected());
//!     println!("{}", output.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`    | on | The `sim-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on | The [`server`] module and the `sim-ocr-server` binary (axum + tower-http) |
//!
//! Library-only users can skip both:
//! ```toml
//! sim-ocr = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod response;
pub mod scan;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Language, ScanConfig, ScanConfigBuilder};
pub use error::{ErrorClass, SimOcrError};
pub use notify::{MailTransport, Notifier, NotifyError, PickupDirTransport};
pub use output::{ScanOutput, ScanStats};
pub use pipeline::classify::{
    classify, ClassificationEvidence, ClassificationPolicy, ClassificationVerdict, Classifier,
};
pub use pipeline::intake::{DocumentImage, ImageSource, UploadedFile};
pub use pipeline::normalize::{normalize, NormalizedText};
pub use pipeline::ocr::{OcrEngine, RecognitionResult, TesseractEngine};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use response::{ErrorEnvelope, ResponseShape};
pub use scan::{scan, scan_base64, scan_file, scan_sync, scan_with_policy};
pub use stream::scan_batch;
