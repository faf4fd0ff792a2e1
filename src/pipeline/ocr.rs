//! OCR adapter: the pipeline's only external effect.
//!
//! The recognition capability is abstracted behind [`OcrEngine`] so the rest
//! of the pipeline never knows whether text came from a local tesseract
//! process, a remote service, or a test double.
//!
//! ## Worker lifetime
//!
//! [`TesseractEngine`] acquires one worker per request and never shares it:
//!
//! 1. take a permit from the worker pool (bounds concurrent processes),
//! 2. write the image to a temp file,
//! 3. spawn `tesseract <file> stdout -l <lang>` with kill-on-drop,
//! 4. wait for output under the recognition timeout.
//!
//! The permit, the temp file and the child process are all owned by values
//! that release them on drop, so every exit path (including a caller dropping
//! the future mid-flight) reaps the process before the permit is returned.

use crate::config::{Language, ScanConfig};
use crate::error::SimOcrError;
use crate::pipeline::intake::DocumentImage;
use async_trait::async_trait;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// The engine's best-effort transcription. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    pub text: String,
}

/// Callback receiving `(bytes_downloaded, total_bytes_option)` while a
/// language model downloads.
pub type ModelProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// A text-recognition capability.
///
/// Implementations must scope any per-call resources to the call itself:
/// nothing acquired by `recognize` may outlive the returned future, whether
/// it completes or is dropped.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Transcribe `image` using the given language model(s).
    async fn recognize(
        &self,
        image: &DocumentImage,
        language: &Language,
    ) -> Result<RecognitionResult, SimOcrError>;

    /// Short engine name for logs, e.g. `tesseract`.
    fn name(&self) -> &str;
}

/// Run `engine` on `image`, logging duration and outcome.
pub async fn recognize(
    engine: &dyn OcrEngine,
    image: &DocumentImage,
    language: &Language,
) -> Result<RecognitionResult, SimOcrError> {
    let start = Instant::now();
    debug!(
        "{}: recognising {} bytes with '{}'",
        engine.name(),
        image.bytes().len(),
        language
    );

    let result = engine.recognize(image, language).await;
    let elapsed = start.elapsed();

    match &result {
        Ok(r) => info!(
            "{}: {} chars recognised in {:?}",
            engine.name(),
            r.text.chars().count(),
            elapsed
        ),
        Err(e) => warn!("{}: recognition failed after {:?}: {}", engine.name(), elapsed, e),
    }
    result
}

// ── Tesseract ────────────────────────────────────────────────────────────────

/// Tesseract OCR via the `tesseract` command-line executable.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    tessdata_dir: Option<PathBuf>,
    timeout: Duration,
    workers: Arc<Semaphore>,
}

impl TesseractEngine {
    /// Build an engine from `config` without touching the network.
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            binary: config.tesseract_binary.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            timeout: Duration::from_secs(config.recognition_timeout_secs),
            workers: Arc::new(Semaphore::new(config.max_concurrent_workers)),
        }
    }

    /// Build an engine and make sure its language models are on disk.
    ///
    /// When `config.tessdata_dir` is unset and auto-download is enabled,
    /// missing models are fetched on a blocking thread via `tessdata_auto`.
    pub async fn prepare(
        config: &ScanConfig,
        on_progress: Option<ModelProgress>,
    ) -> Result<Self, SimOcrError> {
        let mut engine = Self::new(config);
        if engine.tessdata_dir.is_some() || !config.auto_download_models {
            return Ok(engine);
        }

        let spec = config.language.as_str().to_string();
        let language = spec.clone();
        let dir = tokio::task::spawn_blocking(move || {
            let progress: Option<&dyn Fn(u64, Option<u64>)> = match &on_progress {
                Some(f) => Some(f.as_ref()),
                None => None,
            };
            tessdata_auto::ensure_language(&spec, progress)
        })
        .await
        .map_err(|e| SimOcrError::Internal(format!("Model download task panicked: {}", e)))?
        .map_err(|e| SimOcrError::ModelUnavailable {
            language,
            detail: e.to_string(),
        })?;

        info!("Tesseract models resolved in {}", dir.display());
        engine.tessdata_dir = Some(dir);
        Ok(engine)
    }

    /// Directory passed as `--tessdata-dir`, if any.
    pub fn tessdata_dir(&self) -> Option<&Path> {
        self.tessdata_dir.as_deref()
    }

    /// Number of workers that could start right now.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(
        &self,
        image: &DocumentImage,
        language: &Language,
    ) -> Result<RecognitionResult, SimOcrError> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| SimOcrError::Internal("worker pool closed".into()))?;

        let worker = TesseractWorker::spawn(self, image, language, permit).await?;
        let text = worker.finish(self.timeout).await?;
        Ok(RecognitionResult { text })
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// One running tesseract process and everything it holds.
///
/// Dropping it kills the child (kill-on-drop), deletes the input file, and
/// returns the permit.
struct TesseractWorker {
    child: Child,
    _input: NamedTempFile,
    _permit: OwnedSemaphorePermit,
}

impl TesseractWorker {
    async fn spawn(
        engine: &TesseractEngine,
        image: &DocumentImage,
        language: &Language,
        permit: OwnedSemaphorePermit,
    ) -> Result<Self, SimOcrError> {
        // The blocking task owns the temp file until it hands it back, so a
        // dropped caller still ends with the file deleted.
        let bytes = image.bytes().to_vec();
        let suffix = format!(".{}", image.extension());
        let input = tokio::task::spawn_blocking(move || write_input(&bytes, &suffix))
            .await
            .map_err(|e| SimOcrError::Internal(format!("Temp file task failed: {}", e)))??;

        let mut cmd = Command::new(&engine.binary);
        cmd.arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(language.as_str());
        if let Some(dir) = &engine.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| SimOcrError::EngineUnavailable {
            engine: engine.binary.display().to_string(),
            detail: if e.kind() == std::io::ErrorKind::NotFound {
                "executable not found".into()
            } else {
                e.to_string()
            },
        })?;
        debug!("Spawned tesseract pid {:?}", child.id());

        Ok(Self {
            child,
            _input: input,
            _permit: permit,
        })
    }

    async fn finish(self, timeout: Duration) -> Result<String, SimOcrError> {
        let TesseractWorker {
            child,
            _input,
            _permit,
        } = self;

        // On timeout the wait future is dropped, taking the child with it.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| SimOcrError::RecognitionTimeout {
                secs: timeout.as_secs(),
            })?
            .map_err(|e| SimOcrError::RecognitionFailed {
                detail: format!("failed to collect tesseract output: {}", e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let detail = last_lines(&stderr, 3)
                .unwrap_or_else(|| format!("tesseract exited with {}", output.status));
            return Err(SimOcrError::RecognitionFailed { detail });
        }
        if !stderr.trim().is_empty() {
            debug!("tesseract stderr: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Write `bytes` to a fresh temp file through its own handle.
fn write_input(bytes: &[u8], suffix: &str) -> Result<NamedTempFile, SimOcrError> {
    let mut input = tempfile::Builder::new()
        .prefix("sim-ocr-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| SimOcrError::Internal(format!("Failed to create temp file: {}", e)))?;

    let file = input.as_file_mut();
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| SimOcrError::Internal(format!("Failed to write temp file: {}", e)))?;
    Ok(input)
}

/// The last `n` non-empty lines of `s`, joined by "; ".
fn last_lines(s: &str, n: usize) -> Option<String> {
    let lines: Vec<&str> = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(n);
    Some(lines[start..].join("; "))
}
