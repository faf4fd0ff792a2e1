//! Request handlers.

use super::{ApiError, AppState};
use crate::error::SimOcrError;
use crate::notify::NotificationRequest;
use crate::pipeline::classify::ClassificationVerdict;
use crate::pipeline::intake::{DocumentImage, UploadedFile};
use crate::response::{self, ResponseShape};
use crate::scan::{scan_base64, scan_with_policy};
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Name of the multipart field carrying the image.
const FILE_FIELD: &str = "file";

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.engine.name(),
    }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// `POST /api/ocr`: base64 image in, `{ text, simDetected }` out.
pub async fn ocr(State(state): State<AppState>, body: Result<Bytes, BytesRejection>) -> Response {
    let outcome = async {
        let body = body.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large(&state)
            } else {
                SimOcrError::invalid_input(e.body_text())
            }
        })?;
        let payload = image_field(&body)?;
        let out = scan_base64(
            payload.as_deref(),
            state.engine.as_ref(),
            &state.config,
            state.legacy_policy,
        )
        .await?;
        Ok::<ClassificationVerdict, SimOcrError>(out.verdict)
    }
    .await;

    response::assemble(ResponseShape::Legacy, &outcome).into_response()
}

/// Pull `image` out of a JSON body. A missing body, missing field, or
/// `null`/`""` all mean "no image".
fn image_field(body: &[u8]) -> Result<Option<String>, SimOcrError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SimOcrError::invalid_input(format!("Request body is not valid JSON: {e}")))?;
    match value.get("image") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SimOcrError::invalid_input(
            "Field 'image' must be a base64 string",
        )),
    }
}

/// `POST /api/scan`: multipart upload in, `{ success, detected, text }` out.
pub async fn scan(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let outcome = async {
        let multipart = multipart.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large(&state)
            } else {
                SimOcrError::invalid_input(e.body_text())
            }
        })?;
        let uploads = read_uploads(multipart, &state).await?;
        let image = DocumentImage::from_uploads(uploads, state.config.max_image_bytes)?;
        let out = scan_with_policy(
            image,
            state.engine.as_ref(),
            &state.config,
            state.upload_policy,
        )
        .await?;
        Ok::<ClassificationVerdict, SimOcrError>(out.verdict)
    }
    .await;

    response::assemble(ResponseShape::Detection, &outcome).into_response()
}

/// Read the first `file` part. Other fields are skipped.
async fn read_uploads(
    mut multipart: Multipart,
    state: &AppState,
) -> Result<Vec<UploadedFile>, SimOcrError> {
    let upload_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large(state)
        } else {
            SimOcrError::Internal(format!("Malformed upload: {}", e.body_text()))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok(vec![UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }]);
    }
    Ok(Vec::new())
}

fn too_large(state: &AppState) -> SimOcrError {
    SimOcrError::invalid_input(format!(
        "Request body exceeds the {} byte limit",
        state.body_limit()
    ))
}

/// `POST /api/notify`.
pub async fn notify(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request: NotificationRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Request body is not valid JSON: {e}")))?;

    state.notifier.notify(request).await?;
    info!("Notification queued");
    Ok(Json(json!({ "success": true })))
}

/// `OPTIONS /api/notify` without CORS preflight headers.
pub async fn notify_preflight() -> StatusCode {
    StatusCode::OK
}
