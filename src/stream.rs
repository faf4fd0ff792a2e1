//! Batch scanning: many image files, bounded concurrency, results streamed.
//!
//! [`scan_batch`] yields each file's result as soon as it is ready, so a CLI
//! can print verdicts while later files are still in the engine. Results come
//! back in completion order, not input order; every item carries its path.
//!
//! Each file is independent. A file that fails at intake or recognition
//! yields an `Err` for that path and the batch carries on.

use crate::config::ScanConfig;
use crate::error::SimOcrError;
use crate::output::ScanOutput;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::ProgressCallback;
use crate::scan::scan_file;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// One finished file.
pub type BatchItem = (PathBuf, Result<ScanOutput, SimOcrError>);

/// A boxed stream of per-file results.
pub type ScanStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Scan `paths`, at most `config.max_concurrent_workers` at a time.
///
/// The stream is lazy: nothing is read until it is polled. Dropping it
/// cancels in-flight scans, and their workers are released.
pub fn scan_batch(
    paths: Vec<PathBuf>,
    engine: Arc<dyn OcrEngine>,
    config: &ScanConfig,
    progress: Option<ProgressCallback>,
) -> ScanStream {
    let total = paths.len();
    let concurrency = config.max_concurrent_workers.max(1);
    info!(
        "Starting batch scan: {} files, {} at a time",
        total, concurrency
    );
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let finished = Arc::new(AtomicUsize::new(0));
    let succeeded = Arc::new(AtomicUsize::new(0));
    let config = config.clone();

    let s = stream::iter(paths.into_iter().map(move |path| {
        let engine = Arc::clone(&engine);
        let cfg = config.clone();
        let progress = progress.clone();
        let finished = Arc::clone(&finished);
        let succeeded = Arc::clone(&succeeded);
        async move {
            if let Some(ref cb) = progress {
                cb.on_scan_start(&path);
            }

            let result = scan_file(&path, engine.as_ref(), &cfg).await;

            match &result {
                Ok(out) => {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref cb) = progress {
                        cb.on_scan_complete(&path, out.detected());
                    }
                }
                Err(e) => {
                    warn!("{}: {}", path.display(), e);
                    if let Some(ref cb) = progress {
                        cb.on_scan_error(&path, &e.to_string());
                    }
                }
            }

            if finished.fetch_add(1, Ordering::SeqCst) + 1 == total {
                if let Some(ref cb) = progress {
                    cb.on_batch_complete(total, succeeded.load(Ordering::SeqCst));
                }
            }
            (path, result)
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
