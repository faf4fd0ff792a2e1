//! CLI binary for sim-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`,
//! scans every image given on the command line, and prints one verdict per
//! file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use sim_ocr::{
    scan_batch, ClassificationPolicy, Language, OcrEngine, ProgressCallback, ScanConfig,
    ScanOutput, ScanProgressCallback, SimOcrError, TesseractEngine,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for multi-file runs. Files finish out of order, so
/// the bar only counts; verdict lines are printed by `main`.
struct CliProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    /// Print a line to stdout without tearing the bar.
    fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{line}"));
    }
}

impl ScanProgressCallback for CliProgress {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Scanning");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_scan_complete(&self, _path: &Path, _detected: bool) {
        self.bar.inc(1);
    }

    fn on_scan_error(&self, _path: &Path, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} files scanned",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files scanned  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check one photo with the default (corroborated) policy
  sim-ocr ktp-or-sim.jpg

  # Permissive policy, Indonesian + English models
  sim-ocr --policy permissive -l ind+eng scan.png

  # A whole folder, JSON lines on stdout
  sim-ocr --json uploads/*.jpg > verdicts.jsonl

POLICIES:
  corroborated  permit phrase AND "indonesia", or a 16-digit national ID (default)
  permissive    any permit phrase or standalone "sim" token

ENVIRONMENT VARIABLES:
  TESSDATA_PREFIX          Existing tessdata directory; skips the download
  TESSDATA_AUTO_CACHE_DIR  Override the model cache directory
  RUST_LOG                 Log filter (overrides -v / -q)

EXIT STATUS:
  0 when every file was scanned (detected or not), 1 if any file failed.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "sim-ocr",
    version,
    about = "Detect Indonesian driving permits (SIM) in document images via OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files to scan (PNG, JPEG, or anything tesseract reads).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Tesseract language spec, e.g. `eng` or `ind+eng`.
    #[arg(short, long, env = "SIM_OCR_LANGUAGE", default_value = "eng")]
    language: String,

    /// Classification policy: `permissive` (or `a`), `corroborated` (or `b`).
    #[arg(long, env = "SIM_OCR_POLICY", default_value = "corroborated")]
    policy: ClassificationPolicy,

    /// Under the permissive policy, let "republik indonesia" alone count.
    #[arg(long, env = "SIM_OCR_COUNTRY_ALONE_SUFFICES")]
    country_alone_suffices: bool,

    /// Path or name of the tesseract executable.
    #[arg(long, env = "SIM_OCR_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Directory containing `*.traineddata`; disables auto-download.
    #[arg(long, env = "SIM_OCR_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    /// Never download language models.
    #[arg(long, env = "SIM_OCR_NO_DOWNLOAD")]
    no_download: bool,

    /// Per-image recognition timeout in seconds.
    #[arg(long, env = "SIM_OCR_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Maximum concurrent tesseract processes.
    #[arg(short = 'j', long, env = "SIM_OCR_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Largest accepted image in bytes.
    #[arg(long, env = "SIM_OCR_MAX_IMAGE_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_image_bytes: usize,

    /// Print one JSON object per file instead of a verdict line.
    #[arg(long, env = "SIM_OCR_JSON")]
    json: bool,

    /// Also print the transcription under each verdict line.
    #[arg(long)]
    text: bool,

    #[arg(long, env = "SIM_OCR_NO_PROGRESS")]
    no_progress: bool,

    #[arg(short, long, env = "SIM_OCR_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "SIM_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback for multi-file runs; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.images.len() > 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Ensure language models are available ─────────────────────────────
    let model_bar = (!cli.quiet
        && config.tessdata_dir.is_none()
        && config.auto_download_models
        && !tessdata_auto::is_language_cached(config.language.as_str()))
    .then(|| {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix(format!("Model {}", config.language));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let on_progress = model_bar.clone().map(|bar| {
        Arc::new(move |done: u64, total: Option<u64>| {
            if let Some(t) = total {
                if bar.length() != Some(t) {
                    bar.set_length(t);
                }
            }
            bar.set_position(done);
        }) as sim_ocr::pipeline::ocr::ModelProgress
    });

    let engine = TesseractEngine::prepare(&config, on_progress)
        .await
        .context("Failed to prepare the OCR engine")?;
    if let Some(bar) = model_bar {
        bar.finish_and_clear();
    }
    let engine: Arc<dyn OcrEngine> = Arc::new(engine);

    // ── Scan ─────────────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgress::new);
    let callback: Option<ProgressCallback> = progress
        .clone()
        .map(|p| p as Arc<dyn ScanProgressCallback>);

    let total = cli.images.len();
    let mut failed = 0usize;
    let mut results = scan_batch(cli.images.clone(), engine, &config, callback);

    while let Some((path, result)) = results.next().await {
        if result.is_err() {
            failed += 1;
        }
        let line = render(&cli, &path, &result)?;
        match &progress {
            Some(p) => p.println(&line),
            None => println!("{line}"),
        }
    }

    if failed > 0 {
        bail!("{failed} of {total} files failed");
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let language: Language = cli
        .language
        .parse()
        .with_context(|| format!("Invalid language spec '{}'", cli.language))?;

    let mut builder = ScanConfig::builder()
        .language(language)
        .policy(cli.policy)
        .country_alone_suffices(cli.country_alone_suffices)
        .tesseract_binary(&cli.tesseract)
        .auto_download_models(!cli.no_download)
        .recognition_timeout_secs(cli.timeout)
        .max_concurrent_workers(cli.workers)
        .max_image_bytes(cli.max_image_bytes);

    if let Some(ref dir) = cli.tessdata_dir {
        builder = builder.tessdata_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

/// One output line for a finished file.
fn render(cli: &Cli, path: &Path, result: &Result<ScanOutput, SimOcrError>) -> Result<String> {
    if cli.json {
        let value = match result {
            Ok(out) => json!({
                "path": path,
                "detected": out.detected(),
                "text": out.text(),
                "evidence": out.verdict.evidence,
                "policy": out.verdict.policy,
                "image": out.image,
                "stats": out.stats,
            }),
            Err(e) => json!({ "path": path, "error": e.to_string() }),
        };
        return serde_json::to_string(&value).context("Failed to serialise result");
    }

    let name = path.display().to_string();
    let mut line = match result {
        Ok(out) if out.detected() => format!("{} {}  {}", green("✓"), name, bold("SIM detected")),
        Ok(_) => format!("{} {}  {}", dim("·"), name, dim("not a SIM")),
        Err(e) => format!("{} {}  {}", red("✗"), name, red(&e.to_string())),
    };
    if let (true, Ok(out)) = (cli.text, result) {
        for text_line in out.text().lines().filter(|l| !l.trim().is_empty()) {
            line.push_str("\n    ");
            line.push_str(text_line);
        }
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_flag_accepts_names_and_aliases() {
        let cli = Cli::try_parse_from(["sim-ocr", "--policy", "a", "x.jpg"]).unwrap();
        assert_eq!(cli.policy, ClassificationPolicy::Permissive);

        let cli = Cli::try_parse_from(["sim-ocr", "--policy", "Corroborated", "x.jpg"]).unwrap();
        assert_eq!(cli.policy, ClassificationPolicy::Corroborated);

        assert!(Cli::try_parse_from(["sim-ocr", "--policy", "strict", "x.jpg"]).is_err());
    }

    #[test]
    fn policy_defaults_to_corroborated() {
        let cli = Cli::try_parse_from(["sim-ocr", "x.jpg"]).unwrap();
        assert_eq!(build_config(&cli).unwrap().policy, ClassificationPolicy::Corroborated);
    }
}
