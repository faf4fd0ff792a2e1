//! HTTP server binary for sim-ocr.
//!
//! Maps flags (or `SIM_OCR_*` environment variables) to a `ScanConfig`,
//! prepares the tesseract engine once, and serves the router from
//! `sim_ocr::server`.

use anyhow::{Context, Result};
use clap::Parser;
use sim_ocr::server::{serve, AppState};
use sim_ocr::{
    ClassificationPolicy, Language, Notifier, OcrEngine, PickupDirTransport, ScanConfig,
    TesseractEngine,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sim-ocr-server",
    version,
    about = "HTTP service for SIM detection and QR-code notifications",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[arg(long, env = "SIM_OCR_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "SIM_OCR_PORT", default_value_t = 8080)]
    port: u16,

    /// Policy for `POST /api/ocr` (base64, `{ text, simDetected }`):
    /// `permissive` (or `a`), `corroborated` (or `b`).
    #[arg(long, env = "SIM_OCR_LEGACY_POLICY", default_value = "permissive")]
    legacy_policy: ClassificationPolicy,

    /// Policy for `POST /api/scan` (multipart, `{ success, detected, text }`).
    #[arg(long, env = "SIM_OCR_UPLOAD_POLICY", default_value = "corroborated")]
    upload_policy: ClassificationPolicy,

    /// Under the permissive policy, let "republik indonesia" alone count.
    #[arg(long, env = "SIM_OCR_COUNTRY_ALONE_SUFFICES")]
    country_alone_suffices: bool,

    #[arg(short, long, env = "SIM_OCR_LANGUAGE", default_value = "eng")]
    language: String,

    #[arg(long, env = "SIM_OCR_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    #[arg(long, env = "SIM_OCR_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    #[arg(long, env = "SIM_OCR_NO_DOWNLOAD")]
    no_download: bool,

    /// Per-request recognition timeout in seconds.
    #[arg(long, env = "SIM_OCR_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Maximum concurrent tesseract processes across all requests.
    #[arg(long, env = "SIM_OCR_WORKERS", default_value_t = 4)]
    workers: usize,

    #[arg(long, env = "SIM_OCR_MAX_IMAGE_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_image_bytes: usize,

    /// Pickup directory for outgoing notification `.eml` files.
    #[arg(long, env = "SIM_OCR_OUTBOX_DIR", default_value = "outbox")]
    outbox_dir: PathBuf,

    /// `From:` address on notification emails.
    #[arg(long, env = "SIM_OCR_MAIL_FROM", default_value = "sim-ocr@localhost")]
    mail_from: String,

    /// Timeout in seconds for fetching a QR image.
    #[arg(long, env = "SIM_OCR_QR_FETCH_TIMEOUT", default_value_t = 15)]
    qr_fetch_timeout: u64,

    #[arg(short, long, env = "SIM_OCR_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "SIM_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug,tower_http=debug"
    } else if cli.quiet {
        "error"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let language: Language = cli
        .language
        .parse()
        .with_context(|| format!("Invalid language spec '{}'", cli.language))?;
    let mut builder = ScanConfig::builder()
        .language(language)
        .country_alone_suffices(cli.country_alone_suffices)
        .tesseract_binary(&cli.tesseract)
        .auto_download_models(!cli.no_download)
        .recognition_timeout_secs(cli.timeout)
        .max_concurrent_workers(cli.workers)
        .max_image_bytes(cli.max_image_bytes);
    if let Some(ref dir) = cli.tessdata_dir {
        builder = builder.tessdata_dir(dir);
    }
    let config = builder.build().context("Invalid configuration")?;

    info!("Preparing tesseract ({})", config.language);
    let engine = TesseractEngine::prepare(&config, None)
        .await
        .context("Failed to prepare the OCR engine")?;
    let engine: Arc<dyn OcrEngine> = Arc::new(engine);

    let transport = Arc::new(PickupDirTransport::new(&cli.outbox_dir));
    let notifier = Notifier::new(
        transport,
        cli.mail_from.clone(),
        Duration::from_secs(cli.qr_fetch_timeout),
    )
    .context("Failed to build the notifier")?;
    info!("Notifications go to {}", cli.outbox_dir.display());

    let state = AppState::new(engine, config, notifier)
        .legacy_policy(cli.legacy_policy)
        .upload_policy(cli.upload_policy);
    info!(
        "Policies: /api/ocr={} /api/scan={}",
        state.legacy_policy, state.upload_policy
    );

    let addr = format!("{}:{}", cli.host, cli.port);
    serve(&addr, state)
        .await
        .with_context(|| format!("Server on {addr} failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_policies_default_and_parse() {
        let cli = Cli::try_parse_from(["sim-ocr-server"]).unwrap();
        assert_eq!(cli.legacy_policy, ClassificationPolicy::Permissive);
        assert_eq!(cli.upload_policy, ClassificationPolicy::Corroborated);

        let cli = Cli::try_parse_from(["sim-ocr-server", "--legacy-policy", "b"]).unwrap();
        assert_eq!(cli.legacy_policy, ClassificationPolicy::Corroborated);
    }
}
