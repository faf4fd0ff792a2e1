//! Progress-callback trait for batch scan events.
//!
//! Pass an [`Arc<dyn ScanProgressCallback>`] to
//! [`crate::stream::scan_batch`] to receive events as each file is scanned.
//! The library knows nothing about how the host reports progress: the CLI
//! drives a terminal bar, a service might forward events to a channel.
//!
//! # Example
//!
//! ```rust
//! use sim_ocr::ScanProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountDetections(AtomicUsize);
//!
//! impl ScanProgressCallback for CountDetections {
//!     fn on_scan_complete(&self, _path: &Path, detected: bool) {
//!         if detected {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by [`crate::stream::scan_batch`] as it works through the files.
///
/// Files are scanned concurrently, so `on_scan_*` methods may be called from
/// several tasks at once. All methods default to no-ops.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once, before any file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is read and handed to the engine.
    fn on_scan_start(&self, path: &Path) {
        let _ = path;
    }

    /// Called when a file produced a verdict.
    fn on_scan_complete(&self, path: &Path, detected: bool) {
        let _ = (path, detected);
    }

    /// Called when a file failed at intake or recognition.
    fn on_scan_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// Called once, after the last file finished (either way).
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Shared handle passed to [`crate::stream::scan_batch`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(2);
        cb.on_scan_start(Path::new("a.png"));
        cb.on_scan_complete(Path::new("a.png"), true);
        cb.on_scan_error(Path::new("b.png"), "Recognition timed out after 60s");
        cb.on_batch_complete(2, 1);
    }
}
