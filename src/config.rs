//! Configuration types for document scanning.
//!
//! All scan behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. Every knob lives in one cheap-to-clone struct so a
//! server can share it across requests and log it at start-up.

use crate::error::SimOcrError;
use crate::pipeline::classify::ClassificationPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A Tesseract language spec such as `eng` or `eng+ind`.
///
/// Each `+`-separated code must match `[a-z0-9_]+`; the codes name the
/// `traineddata` models the engine loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    /// The language spec exactly as passed to the engine.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The individual model codes.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.0.split('+')
    }
}

impl Default for Language {
    fn default() -> Self {
        Language("eng".to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = SimOcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes = tessdata_auto::parse_language_spec(s)
            .map_err(|e| SimOcrError::InvalidConfig(e.to_string()))?;
        Ok(Language(codes.join("+")))
    }
}

impl TryFrom<String> for Language {
    type Error = SimOcrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Language> for String {
    fn from(l: Language) -> Self {
        l.0
    }
}

/// Configuration for scanning a document image.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use sim_ocr::{ClassificationPolicy, ScanConfig};
///
/// let config = ScanConfig::builder()
///     .language("eng+ind".parse().unwrap())
///     .policy(ClassificationPolicy::Permissive)
///     .recognition_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Language model(s) the OCR engine loads. Default: `eng`.
    pub language: Language,

    /// Heuristic rule set used to classify the transcription.
    /// Default: [`ClassificationPolicy::Corroborated`].
    pub policy: ClassificationPolicy,

    /// Under [`ClassificationPolicy::Permissive`], let a bare
    /// "republik indonesia" mention count as a detection. Default: false.
    ///
    /// Ignored by [`ClassificationPolicy::Corroborated`], which always needs
    /// the country mention corroborated by a permit phrase.
    pub country_alone_suffices: bool,

    /// Path or name of the `tesseract` executable. Default: `tesseract`.
    pub tesseract_binary: PathBuf,

    /// Directory holding `*.traineddata` models. If None, resolved by
    /// auto-download (when enabled) or left to tesseract's own default.
    pub tessdata_dir: Option<PathBuf>,

    /// Download missing language models on start-up. Default: true.
    pub auto_download_models: bool,

    /// Wall-clock limit for a single recognition, in seconds. Default: 60.
    ///
    /// A worker exceeding it is killed and the request fails.
    pub recognition_timeout_secs: u64,

    /// Maximum number of OCR worker processes alive at once. Default: 4.
    ///
    /// Tesseract is CPU-bound; more workers than cores only adds contention.
    pub max_concurrent_workers: usize,

    /// Largest accepted decoded image, in bytes. Default: 10 MiB.
    pub max_image_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            policy: ClassificationPolicy::default(),
            country_alone_suffices: false,
            tesseract_binary: PathBuf::from("tesseract"),
            tessdata_dir: None,
            auto_download_models: true,
            recognition_timeout_secs: 60,
            max_concurrent_workers: 4,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn policy(mut self, policy: ClassificationPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn country_alone_suffices(mut self, v: bool) -> Self {
        self.config.country_alone_suffices = v;
        self
    }

    pub fn tesseract_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_binary = path.into();
        self
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tessdata_dir = Some(dir.into());
        self
    }

    pub fn auto_download_models(mut self, v: bool) -> Self {
        self.config.auto_download_models = v;
        self
    }

    pub fn recognition_timeout_secs(mut self, secs: u64) -> Self {
        self.config.recognition_timeout_secs = secs;
        self
    }

    pub fn max_concurrent_workers(mut self, n: usize) -> Self {
        self.config.max_concurrent_workers = n;
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.config.max_image_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, SimOcrError> {
        let c = &self.config;
        if c.recognition_timeout_secs == 0 {
            return Err(SimOcrError::InvalidConfig(
                "Recognition timeout must be ≥ 1s".into(),
            ));
        }
        if c.max_concurrent_workers == 0 {
            return Err(SimOcrError::InvalidConfig(
                "Worker limit must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(SimOcrError::InvalidConfig(
                "Image size limit must be ≥ 1 byte".into(),
            ));
        }
        if c.tesseract_binary.as_os_str().is_empty() {
            return Err(SimOcrError::InvalidConfig(
                "Tesseract binary path is empty".into(),
            ));
        }
        Ok(self.config)
    }
}
