//! Image intake: turn a base64 payload, an uploaded file, or a local path
//! into the raw bytes handed to the OCR engine.
//!
//! Intake never judges whether the bytes are a *readable* image. That is the
//! engine's call; a corrupt image is a recognition failure, not a client
//! error. Intake only guarantees that there is something to recognise: every
//! empty or missing input is rejected here so the engine is never invoked
//! for it. The container format is sniffed from magic bytes purely so logs
//! and output can say what was scanned.

use crate::error::SimOcrError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{DecodeError, Engine as _};
use image::ImageFormat;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Message returned when a base64 request carries no image.
pub const NO_IMAGE_PROVIDED: &str = "No image provided";

/// Message returned when a multipart request carries no file.
pub const NO_FILE_UPLOADED: &str = "No file uploaded";

/// Padding optional, stray trailing bits ignored.
const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Where a [`DocumentImage`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Base64,
    Upload,
    File,
}

/// One file part taken from a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
    /// Client-supplied content type, if any.
    pub content_type: Option<String>,
    /// The file contents.
    pub bytes: Vec<u8>,
}

/// An encoded document image, owned by a single request.
#[derive(Debug, Clone)]
pub struct DocumentImage {
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
    source: ImageSource,
}

/// Summary of an accepted image, safe to log and serialise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub source: ImageSource,
    pub byte_len: usize,
    /// MIME type sniffed from magic bytes; None if unrecognised.
    pub mime_type: Option<String>,
}

impl DocumentImage {
    /// Accept raw bytes, rejecting empty or oversized buffers.
    pub fn from_bytes(
        bytes: Vec<u8>,
        source: ImageSource,
        max_bytes: usize,
    ) -> Result<Self, SimOcrError> {
        if bytes.is_empty() {
            return Err(SimOcrError::invalid_input(match source {
                ImageSource::Base64 => NO_IMAGE_PROVIDED,
                ImageSource::Upload => NO_FILE_UPLOADED,
                ImageSource::File => "Image file is empty",
            }));
        }
        if bytes.len() > max_bytes {
            return Err(SimOcrError::invalid_input(format!(
                "Image is {} bytes; the limit is {} bytes",
                bytes.len(),
                max_bytes
            )));
        }

        let format = image::guess_format(&bytes).ok();
        debug!(
            "Accepted {:?} image: {} bytes, format {:?}",
            source,
            bytes.len(),
            format
        );

        Ok(Self {
            bytes,
            format,
            source,
        })
    }

    /// Decode a base64 field such as `{ "image": "<base64>" }`.
    ///
    /// A missing or blank field is [`NO_IMAGE_PROVIDED`]. A `data:` URI prefix
    /// and embedded whitespace (line-wrapped payloads) are tolerated.
    pub fn from_base64(payload: Option<&str>, max_bytes: usize) -> Result<Self, SimOcrError> {
        let payload = match payload.map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => return Err(SimOcrError::invalid_input(NO_IMAGE_PROVIDED)),
        };

        let body = strip_data_uri(payload);
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.is_empty() {
            return Err(SimOcrError::invalid_input(NO_IMAGE_PROVIDED));
        }

        let bytes = decode_base64(compact.as_bytes())
            .map_err(|e| SimOcrError::invalid_input(format!("Image is not valid base64: {e}")))?;

        Self::from_bytes(bytes, ImageSource::Base64, max_bytes)
    }

    /// Take the image from the `file` parts of a multipart upload.
    ///
    /// Several parts collapse to the first one; none is [`NO_FILE_UPLOADED`].
    pub fn from_uploads(
        files: impl IntoIterator<Item = UploadedFile>,
        max_bytes: usize,
    ) -> Result<Self, SimOcrError> {
        let file = files
            .into_iter()
            .next()
            .ok_or_else(|| SimOcrError::invalid_input(NO_FILE_UPLOADED))?;

        debug!(
            "Upload: name={:?} content_type={:?}",
            file.file_name, file.content_type
        );
        Self::from_bytes(file.bytes, ImageSource::Upload, max_bytes)
    }

    /// Read an image from the local file system.
    pub async fn from_path(path: &Path, max_bytes: usize) -> Result<Self, SimOcrError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SimOcrError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => SimOcrError::invalid_input(format!(
                "Permission denied reading '{}'",
                path.display()
            )),
            _ => SimOcrError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
        })?;

        Self::from_bytes(bytes, ImageSource::File, max_bytes)
    }

    /// The encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Container format sniffed from magic bytes.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn source(&self) -> ImageSource {
        self.source
    }

    /// File extension matching the sniffed format, `img` when unknown.
    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("img")
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            source: self.source,
            byte_len: self.bytes.len(),
            mime_type: self.format.map(|f| f.to_mime_type().to_string()),
        }
    }
}

/// Decode standard or URL-safe base64, with or without padding.
fn decode_base64(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    match STANDARD_LENIENT.decode(body) {
        Err(DecodeError::InvalidByte(..)) => URL_SAFE_LENIENT.decode(body),
        other => other,
    }
}

/// Strip a `data:image/png;base64,` style prefix.
fn strip_data_uri(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some((_, rest)) = payload.split_once(',') {
            return rest;
        }
    }
    payload
}
