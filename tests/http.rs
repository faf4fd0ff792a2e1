//! HTTP surface tests: the axum router driven in-process with `oneshot`.

#![cfg(feature = "server")]

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{ScriptedEngine, SIM_TRANSCRIPTION};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sim_ocr::server::{build_router, AppState};
use sim_ocr::{Notifier, OcrEngine, PickupDirTransport, ScanConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "sim-ocr-test-boundary";

fn app_with(engine: Arc<dyn OcrEngine>, outbox: &Path) -> Router {
    app_with_config(engine, outbox, ScanConfig::default())
}

fn app_with_config(engine: Arc<dyn OcrEngine>, outbox: &Path, config: ScanConfig) -> Router {
    let notifier = Notifier::new(
        Arc::new(PickupDirTransport::new(outbox)),
        "sekolah@example.sch.id",
        Duration::from_secs(5),
    )
    .unwrap();
    build_router(AppState::new(engine, config, notifier))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A multipart body with one part per `(field, file_name, bytes)`.
fn multipart_post(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                     Content-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/scan")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// ── /api/ocr (base64, legacy shape) ──────────────────────────────────────────

#[tokio::test]
async fn ocr_reports_detection_in_legacy_shape() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    let (status, body) = send(
        &app,
        json_post("/api/ocr", json!({ "image": "ZmFrZS1wbmc=" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "text": SIM_TRANSCRIPTION, "simDetected": true })
    );
    assert_eq!(engine.last_image().unwrap(), b"fake-png");
}

#[tokio::test]
async fn ocr_without_image_is_400_and_skips_ocr() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    for body in [json!({}), json!({ "image": "" }), json!({ "image": null })] {
        let (status, resp) = send(&app, json_post("/api/ocr", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({ "error": "No image provided" }));
    }

    let empty = Request::builder()
        .method(Method::POST)
        .uri("/api/ocr")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn ocr_invalid_base64_is_400() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    let (status, body) = send(&app, json_post("/api/ocr", json!({ "image": "%%%" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("base64"));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn ocr_engine_failure_is_500_without_text() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::failing("Error in pixReadMem"), outbox.path());

    let (status, body) = send(&app, json_post("/api/ocr", json!({ "image": "aGk=" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "OCR failed");
    assert!(body["details"].as_str().unwrap().contains("pixReadMem"));
    assert!(body.get("text").is_none());
}

// ── /api/scan (multipart, detection shape) ───────────────────────────────────

#[tokio::test]
async fn scan_reports_detection_shape() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    let (status, body) = send(
        &app,
        multipart_post(&[("file", Some("sim.png"), b"png-bytes")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "detected": true, "text": SIM_TRANSCRIPTION })
    );
    assert_eq!(engine.last_image().unwrap(), b"png-bytes");
}

#[tokio::test]
async fn scan_uses_the_first_file_and_ignores_other_fields() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text("struk belanja");
    let app = app_with(engine.clone(), outbox.path());

    let (status, body) = send(
        &app,
        multipart_post(&[
            ("note", None, b"front side"),
            ("file", Some("front.png"), b"front"),
            ("file", Some("back.png"), b"back"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detected"], false);
    assert_eq!(engine.calls(), 1);
    assert_eq!(engine.last_image().unwrap(), b"front");
}

#[tokio::test]
async fn scan_without_file_is_400_and_skips_ocr() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    let (status, body) = send(&app, multipart_post(&[("note", None, b"hello")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file uploaded" }));

    let (status, body) = send(&app, multipart_post(&[("file", Some("empty.png"), b"")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file uploaded" }));

    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn scan_engine_failure_is_500_without_text() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::failing("Error in pixReadMem"), outbox.path());

    let (status, body) = send(&app, multipart_post(&[("file", Some("x.png"), b"x")])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Recognition failed: Error in pixReadMem" })
    );
}

#[tokio::test]
async fn endpoints_use_their_own_policies() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text("SIM Jakarta"), outbox.path());

    let (_, legacy) = send(&app, json_post("/api/ocr", json!({ "image": "aGk=" }))).await;
    let (_, upload) = send(&app, multipart_post(&[("file", Some("x.png"), b"x")])).await;
    assert_eq!(legacy["simDetected"], true);
    assert_eq!(upload["detected"], false);
}

// ── Body limit ───────────────────────────────────────────────────────────────

fn tiny_limit() -> ScanConfig {
    ScanConfig::builder().max_image_bytes(16).build().unwrap()
}

#[tokio::test]
async fn oversized_base64_body_is_400_and_skips_ocr() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with_config(engine.clone(), outbox.path(), tiny_limit());

    let image = "A".repeat(200 * 1024);
    let (status, body) = send(&app, json_post("/api/ocr", json!({ "image": image }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("byte limit"), "{body}");
    assert!(body.get("text").is_none());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn oversized_upload_is_400_and_skips_ocr() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with_config(engine.clone(), outbox.path(), tiny_limit());

    let big = vec![0u8; 200 * 1024];
    let req = multipart_post(&[("file", Some("big.png"), big.as_slice())]);
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("byte limit"), "{body}");
    assert!(body.get("text").is_none());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn image_over_limit_but_within_body_allowance_is_400() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with_config(engine.clone(), outbox.path(), tiny_limit());

    let (status, body) = send(
        &app,
        multipart_post(&[("file", Some("x.png"), &[7u8; 64])]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"), "{body}");
    assert_eq!(engine.calls(), 0);
}

// ── Method handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn non_post_methods_are_405() {
    let outbox = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::text(SIM_TRANSCRIPTION);
    let app = app_with(engine.clone(), outbox.path());

    for (method, uri) in [
        (Method::GET, "/api/ocr"),
        (Method::PUT, "/api/ocr"),
        (Method::GET, "/api/scan"),
        (Method::DELETE, "/api/scan"),
        (Method::GET, "/api/notify"),
    ] {
        let req = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        assert_eq!(body, json!({ "error": "Method not allowed" }));
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn health_is_ok() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engine"], "scripted");
}

// ── /api/notify ──────────────────────────────────────────────────────────────

/// Serve `bytes` at `/qr.png` with `status` on an ephemeral local port.
async fn qr_server(status: StatusCode, bytes: &'static [u8]) -> String {
    let app = Router::new().route(
        "/qr.png",
        axum::routing::get(move || async move {
            (status, [(header::CONTENT_TYPE, "image/png")], bytes)
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}/qr.png")
}

fn notify_body(qr_url: &str) -> Value {
    json!({
        "email": "siswa@example.sch.id",
        "nama": "Budi",
        "kelas": "XII",
        "jurusan": "TKJ",
        "qr_url": qr_url,
    })
}

fn eml_files(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(rd) => rd
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "eml"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn notify_queues_an_email_with_the_qr_inline() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());
    let url = qr_server(StatusCode::OK, b"\x89PNG-fake-qr").await;

    let (status, body) = send(&app, json_post("/api/notify", notify_body(&url))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "success": true }));

    let files = eml_files(outbox.path());
    assert_eq!(files.len(), 1);
    let eml = std::fs::read_to_string(&files[0]).unwrap();
    assert!(eml.contains("Subject: QR Code Siswa\r\n"));
    assert!(eml.contains("Content-ID: <qr_image>"));
    assert!(eml.contains("filename=\"qr_code.png\""));
}

#[tokio::test]
async fn notify_missing_field_is_400() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());

    let mut body = notify_body("http://127.0.0.1:9/qr.png");
    body.as_object_mut().unwrap().remove("email");
    let (status, resp) = send(&app, json_post("/api/notify", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp, json!({ "error": "Missing required field 'email'" }));
    assert!(eml_files(outbox.path()).is_empty());
}

#[tokio::test]
async fn notify_qr_fetch_failure_is_500() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());
    let url = qr_server(StatusCode::NOT_FOUND, b"").await;

    let (status, body) = send(&app, json_post("/api/notify", notify_body(&url))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("404"));
    assert!(eml_files(outbox.path()).is_empty());
}

#[tokio::test]
async fn notify_cors_preflight_and_plain_options() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/notify")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,apikey")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST") && methods.contains("OPTIONS"));
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed.contains("apikey") && allowed.contains("x-client-info"));

    let plain = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/notify")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(plain).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn notify_errors_carry_cors_origin() {
    let outbox = tempfile::tempdir().unwrap();
    let app = app_with(ScriptedEngine::text(""), outbox.path());

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/notify")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
