//! Eager (single-image) scan entry points.
//!
//! Each function runs the whole pipeline for one image and returns once the
//! verdict is ready. Use [`crate::stream::scan_batch`] to scan many files with
//! bounded concurrency.
//!
//! Intake always happens before the engine is touched: an empty or missing
//! image fails here and the engine is never called.

use crate::config::ScanConfig;
use crate::error::SimOcrError;
use crate::output::{ScanOutput, ScanStats};
use crate::pipeline::classify::{ClassificationPolicy, Classifier};
use crate::pipeline::intake::DocumentImage;
use crate::pipeline::ocr::{self, OcrEngine};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Scan an accepted image using the policy in `config`.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Any recognition failure. There is no partial verdict.
pub async fn scan(
    image: DocumentImage,
    engine: &dyn OcrEngine,
    config: &ScanConfig,
) -> Result<ScanOutput, SimOcrError> {
    scan_with_policy(image, engine, config, config.policy).await
}

/// Scan an accepted image with an explicit policy, overriding `config.policy`.
///
/// The server uses this to give each endpoint its own policy while sharing one
/// config and engine.
pub async fn scan_with_policy(
    image: DocumentImage,
    engine: &dyn OcrEngine,
    config: &ScanConfig,
    policy: ClassificationPolicy,
) -> Result<ScanOutput, SimOcrError> {
    let total_start = Instant::now();
    let info = image.info();

    let recognition_start = Instant::now();
    let recognized = ocr::recognize(engine, &image, &config.language).await?;
    let recognition_ms = recognition_start.elapsed().as_millis() as u64;
    // The image bytes are not needed past recognition.
    drop(image);

    let verdict = Classifier::new(policy)
        .country_alone_suffices(config.country_alone_suffices)
        .classify(&recognized.text);
    debug!("Evidence: {:?}", verdict.evidence);

    let stats = ScanStats {
        engine: engine.name().to_string(),
        language: config.language.to_string(),
        recognition_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Scan complete: detected={} policy={} chars={} in {}ms",
        verdict.detected,
        policy,
        verdict.text.chars().count(),
        stats.total_ms
    );

    Ok(ScanOutput {
        verdict,
        image: info,
        stats,
    })
}

/// Decode a base64 payload and scan it.
///
/// `payload` is the raw request field; `None` or blank is rejected before the
/// engine is called.
pub async fn scan_base64(
    payload: Option<&str>,
    engine: &dyn OcrEngine,
    config: &ScanConfig,
    policy: ClassificationPolicy,
) -> Result<ScanOutput, SimOcrError> {
    let image = DocumentImage::from_base64(payload, config.max_image_bytes)?;
    scan_with_policy(image, engine, config, policy).await
}

/// Read an image file and scan it with the policy in `config`.
pub async fn scan_file(
    path: impl AsRef<Path>,
    engine: &dyn OcrEngine,
    config: &ScanConfig,
) -> Result<ScanOutput, SimOcrError> {
    let path = path.as_ref();
    info!("Scanning {}", path.display());
    let image = DocumentImage::from_path(path, config.max_image_bytes).await?;
    scan(image, engine, config).await
}

/// Synchronous wrapper around [`scan_file`].
///
/// Creates a temporary tokio runtime internally. Must not be called from
/// inside an async context.
pub fn scan_sync(
    path: impl AsRef<Path>,
    engine: &dyn OcrEngine,
    config: &ScanConfig,
) -> Result<ScanOutput, SimOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SimOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan_file(path, engine, config))
}
