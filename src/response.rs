//! Response assembly: verdicts and failures into wire bodies plus a status.
//!
//! Two success shapes exist side by side because two kinds of caller exist:
//!
//! ```text
//! Legacy     (base64 endpoint)     { "text": "...", "simDetected": true }
//! Detection  (multipart endpoint)  { "success": true, "detected": true, "text": "..." }
//! ```
//!
//! Failures always render an [`ErrorEnvelope`] and never carry a `text` field,
//! so a partial transcription cannot leak out of a failed request.

use crate::error::{ErrorClass, SimOcrError};
use crate::pipeline::classify::ClassificationVerdict;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// Body of a 405 response.
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";

/// Generic message for recognition failures on the legacy endpoint.
pub const OCR_FAILED: &str = "OCR failed";

/// Which success body a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{ text, simDetected }`
    Legacy,
    /// `{ success, detected, text }`
    Detection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyOcrResponse {
    pub text: String,
    #[serde(rename = "simDetected")]
    pub sim_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub detected: bool,
    pub text: String,
}

/// Terminal body for any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// The envelope for a request made with the wrong HTTP method.
    pub fn method_not_allowed() -> Self {
        Self::new(METHOD_NOT_ALLOWED)
    }
}

/// A fully assembled response: HTTP status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledResponse {
    pub status: u16,
    pub body: Value,
}

/// HTTP status for a pipeline failure.
pub fn status_for(err: &SimOcrError) -> u16 {
    match err.class() {
        ErrorClass::Input => 400,
        ErrorClass::Recognition | ErrorClass::Unexpected => 500,
    }
}

/// Render a failure in the envelope its endpoint has always used.
///
/// Input errors carry their reason verbatim on both shapes. Server-side
/// failures on the legacy shape read `OCR failed` with the diagnostic in
/// `details`; the detection shape puts the diagnostic straight in `error`.
pub fn error_envelope(shape: ResponseShape, err: &SimOcrError) -> ErrorEnvelope {
    match (err.class(), shape) {
        (ErrorClass::Input, _) => ErrorEnvelope::new(err.to_string()),
        (_, ResponseShape::Legacy) => ErrorEnvelope::new(OCR_FAILED).with_details(err.to_string()),
        (ErrorClass::Recognition, ResponseShape::Detection) => ErrorEnvelope::new(err.to_string()),
        (ErrorClass::Unexpected, ResponseShape::Detection) => ErrorEnvelope::new(OCR_FAILED),
    }
}

/// Render a verdict in the requested success shape.
pub fn success_body(shape: ResponseShape, verdict: &ClassificationVerdict) -> Value {
    let body = match shape {
        ResponseShape::Legacy => serde_json::to_value(LegacyOcrResponse {
            text: verdict.text.clone(),
            sim_detected: verdict.detected,
        }),
        ResponseShape::Detection => serde_json::to_value(DetectionResponse {
            success: true,
            detected: verdict.detected,
            text: verdict.text.clone(),
        }),
    };
    // Both structs hold only strings and bools.
    body.unwrap_or(Value::Null)
}

/// Assemble the outbound response for a finished pipeline run.
///
/// Failures are logged here, before the envelope is built.
pub fn assemble(
    shape: ResponseShape,
    outcome: &Result<ClassificationVerdict, SimOcrError>,
) -> AssembledResponse {
    match outcome {
        Ok(verdict) => AssembledResponse {
            status: 200,
            body: success_body(shape, verdict),
        },
        Err(err) => {
            let status = status_for(err);
            error!(?shape, status, "OCR error: {err}");
            let envelope = error_envelope(shape, err);
            AssembledResponse {
                status,
                body: serde_json::to_value(envelope).unwrap_or(Value::Null),
            }
        }
    }
}
