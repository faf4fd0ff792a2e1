//! # tessdata-auto
//!
//! Auto-download and cache [Tesseract](https://github.com/tesseract-ocr/tesseract)
//! language models (`<code>.traineddata`) at runtime, so that callers of the
//! `tesseract` executable no longer need to install language packs by hand and
//! point `TESSDATA_PREFIX` at them.
//!
//! ## How it works
//!
//! On a call to [`ensure_language`]:
//!
//! 1. Checks `TESSDATA_PREFIX` (and `TESSDATA_PREFIX/tessdata`) for every
//!    requested model.
//! 2. Otherwise checks `~/.cache/sim-ocr/tessdata-fast/` for the model files.
//! 3. Downloads whatever is missing from
//!    [tesseract-ocr/tessdata_fast](https://github.com/tesseract-ocr/tessdata_fast).
//! 4. Returns the directory to hand to `tesseract --tessdata-dir`.
//!
//! Subsequent calls skip the network entirely; the models are already cached.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tessdata_auto::ensure_language;
//!
//! // English and Indonesian, with a progress readout
//! let dir = ensure_language("eng+ind", Some(&|downloaded, total| {
//!     if let Some(t) = total {
//!         eprint!("\rDownloading model: {}/{} bytes", downloaded, t);
//!     }
//! })).expect("model download failed");
//! println!("tesseract --tessdata-dir {}", dir.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `TESSDATA_PREFIX`: directory with existing models; skips download when
//!   every requested model is present there.
//! - `TESSDATA_AUTO_CACHE_DIR`: override the default cache directory.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// The model flavour downloaded by this crate.
///
/// `tessdata_fast` models are integer-quantised LSTM models: roughly a tenth
/// of the size of `tessdata_best` and what most distributions ship by default.
pub const TESSDATA_FLAVOUR: &str = "tessdata-fast";

/// Raw-file base URL of the model repository.
const BASE_URL: &str = "https://raw.githubusercontent.com/tesseract-ocr/tessdata_fast/main";

/// File extension of a Tesseract language model.
const MODEL_EXTENSION: &str = "traineddata";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tessdata-auto operations.
#[derive(Error, Debug)]
pub enum TessdataAutoError {
    /// The language code is empty or contains characters outside `[a-z0-9_]`.
    #[error("Invalid Tesseract language code: '{code}'")]
    InvalidLanguage { code: String },

    /// Could not create or navigate the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// The downloaded model could not be written to disk.
    #[error("Failed to write model to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Language codes ───────────────────────────────────────────────────────────

/// Split a Tesseract language spec (`eng`, `eng+ind`) into validated codes.
pub fn parse_language_spec(spec: &str) -> Result<Vec<String>, TessdataAutoError> {
    spec.split('+')
        .map(|code| {
            let code = code.trim();
            let valid = !code.is_empty()
                && code
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if valid {
                Ok(code.to_string())
            } else {
                Err(TessdataAutoError::InvalidLanguage {
                    code: code.to_string(),
                })
            }
        })
        .collect()
}

/// File name of the model for a single language code, e.g. `eng.traineddata`.
pub fn model_file_name(code: &str) -> String {
    format!("{code}.{MODEL_EXTENSION}")
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the cache directory for downloaded models.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/sim-ocr/tessdata-fast/`
/// - **Linux**: `~/.cache/sim-ocr/tessdata-fast/`
/// - **Windows**: `%LOCALAPPDATA%\sim-ocr\tessdata-fast\`
///
/// Override by setting `TESSDATA_AUTO_CACHE_DIR`.
pub fn tessdata_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("TESSDATA_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir).join(TESSDATA_FLAVOUR);
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("sim-ocr").join(TESSDATA_FLAVOUR)
}

/// Candidate directories derived from `TESSDATA_PREFIX`, most specific first.
fn prefix_candidates() -> Vec<PathBuf> {
    match std::env::var("TESSDATA_PREFIX") {
        Ok(prefix) if !prefix.is_empty() => {
            let p = PathBuf::from(prefix);
            vec![p.join("tessdata"), p]
        }
        _ => Vec::new(),
    }
}

/// First directory among `candidates` holding every model in `codes`.
fn dir_with_all(candidates: &[PathBuf], codes: &[String]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| codes.iter().all(|c| dir.join(model_file_name(c)).is_file()))
        .cloned()
}

// ── Process-wide resolution cache ────────────────────────────────────────────

/// Resolved directory per language spec. The mutex is held while downloading
/// so concurrent callers never fetch the same model twice.
static RESOLVED: OnceLock<Mutex<HashMap<String, PathBuf>>> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the directory holding every model in `spec`, or `None` if at least
/// one model still has to be downloaded.
pub fn cached_model_dir(spec: &str) -> Option<PathBuf> {
    let codes = parse_language_spec(spec).ok()?;
    let mut candidates = prefix_candidates();
    candidates.push(tessdata_cache_dir());
    dir_with_all(&candidates, &codes)
}

/// Returns `true` if every model in `spec` is available without network access.
pub fn is_language_cached(spec: &str) -> bool {
    cached_model_dir(spec).is_some()
}

/// Ensures every model named by `spec` (e.g. `eng+ind`) is present locally and
/// returns the directory to pass as `--tessdata-dir`.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during each
/// model download. Pass `None` to suppress progress callbacks.
///
/// # Thread safety
///
/// Safe to call from multiple threads simultaneously; each model is downloaded
/// at most once per process lifetime.
pub fn ensure_language(
    spec: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, TessdataAutoError> {
    let codes = parse_language_spec(spec)?;
    let key = codes.join("+");

    let resolved = RESOLVED.get_or_init(|| Mutex::new(HashMap::new()));
    // A poisoned lock only means another thread panicked mid-download; the
    // map itself is still consistent.
    let mut guard = resolved.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(dir) = guard.get(&key) {
        return Ok(dir.clone());
    }

    let dir = resolve_or_download(&codes, on_progress)?;
    guard.insert(key, dir.clone());
    Ok(dir)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve_or_download(
    codes: &[String],
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, TessdataAutoError> {
    // 1. Environment override holding every model.
    if let Some(dir) = dir_with_all(&prefix_candidates(), codes) {
        return Ok(dir);
    }

    // 2. Cache directory, downloading what is missing.
    let cache_dir = tessdata_cache_dir();
    download_missing(&cache_dir, codes, BASE_URL, on_progress)?;
    Ok(cache_dir)
}

/// Download every model in `codes` that is not yet in `dir`.
fn download_missing(
    dir: &Path,
    codes: &[String],
    base_url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<(), TessdataAutoError> {
    std::fs::create_dir_all(dir).map_err(TessdataAutoError::CacheDir)?;

    for code in codes {
        let dest = dir.join(model_file_name(code));
        if dest.is_file() {
            continue;
        }
        let url = format!("{}/{}", base_url, model_file_name(code));
        let bytes = download_bytes(&url, on_progress)?;
        if bytes.is_empty() {
            return Err(TessdataAutoError::Download(format!(
                "empty response for {url}"
            )));
        }
        write_atomic(&dest, &bytes)?;
    }
    Ok(())
}

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, TessdataAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("tessdata-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| TessdataAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| TessdataAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(TessdataAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let capacity = total.unwrap_or(4 * 1024 * 1024) as usize;
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TessdataAutoError::Download(format!("Read error: {e}")));
            }
        }
    }

    Ok(buf)
}

/// Write to `<dest>.part` then rename, so a crash never leaves a truncated
/// model that tesseract would later fail to load.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), TessdataAutoError> {
    let tmp = dest.with_extension(format!("{MODEL_EXTENSION}.part"));
    let write_err = |source| TessdataAutoError::Write {
        path: dest.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::create(&tmp).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    std::fs::rename(&tmp, dest).map_err(write_err)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
