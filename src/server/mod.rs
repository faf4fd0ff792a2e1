//! HTTP service: the scan pipeline and QR notifications behind axum.
//!
//! | Route | Method | Body | Response |
//! |-------|--------|------|----------|
//! | `/health` | GET | | `{ status, version, engine }` |
//! | `/api/ocr` | POST | JSON `{ image: base64 }` | `{ text, simDetected }` |
//! | `/api/scan` | POST | multipart field `file` | `{ success, detected, text }` |
//! | `/api/notify` | POST, OPTIONS | JSON `{ email, nama, kelas, jurusan, qr_url }` | `{ success: true }` |
//!
//! Any other method on the POST routes is answered with 405
//! `{ "error": "Method not allowed" }` before the body is read.
//!
//! All requests share one [`OcrEngine`]; each request acquires and releases
//! its own worker inside the engine.

mod error;
mod handlers;

pub use error::ApiError;

use crate::config::ScanConfig;
use crate::notify::Notifier;
use crate::pipeline::classify::ClassificationPolicy;
use crate::pipeline::ocr::OcrEngine;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Allowance for JSON framing and multipart headers on top of the image.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn OcrEngine>,
    pub config: Arc<ScanConfig>,
    /// Policy for `/api/ocr`. Default: permissive.
    pub legacy_policy: ClassificationPolicy,
    /// Policy for `/api/scan`. Default: corroborated.
    pub upload_policy: ClassificationPolicy,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(engine: Arc<dyn OcrEngine>, config: ScanConfig, notifier: Notifier) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            legacy_policy: ClassificationPolicy::Permissive,
            upload_policy: ClassificationPolicy::Corroborated,
            notifier: Arc::new(notifier),
        }
    }

    pub fn legacy_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.legacy_policy = policy;
        self
    }

    pub fn upload_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    /// Largest request body accepted on the scan routes.
    ///
    /// Base64 inflates the image by 4/3.
    pub fn body_limit(&self) -> usize {
        self.config
            .max_image_bytes
            .saturating_mul(4)
            .div_ceil(3)
            .saturating_add(BODY_OVERHEAD)
    }
}

/// Build the service router.
pub fn build_router(state: AppState) -> Router {
    let notify_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    let notify = Router::new()
        .route(
            "/api/notify",
            post(handlers::notify)
                .options(handlers::notify_preflight)
                .fallback(handlers::method_not_allowed),
        )
        .layer(notify_cors);

    let scan = Router::new()
        .route(
            "/api/ocr",
            post(handlers::ocr).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/scan",
            post(handlers::scan).fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(state.body_limit()));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(scan)
        .merge(notify)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}
