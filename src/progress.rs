//! Progress reporting for scan runs.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to follow a run
//! through its states. The CLI drives a spinner from it; an app would update
//! its "reading QR… / importing items…" status line.
//!
//! # Example
//!
//! ```rust
//! use nfce2list::{ScanConfig, ScanProgressCallback, ScanState};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ScanProgressCallback for Printer {
//!     fn on_state(&self, state: &ScanState) {
//!         eprintln!("→ {state}");
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The states a scan run moves through.
///
/// ```text
/// Start → QrResolved → PageFetched → ItemsExtracted → Done
///   │          │            │
///   ▼          ▼            ▼
/// QrFailed  FetchFailed  ExtractionFailed
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Start,
    QrResolved { url: String },
    PageFetched { bytes: usize },
    ItemsExtracted { count: usize },
    Done,
    QrFailed,
    FetchFailed,
    ExtractionFailed,
}

impl ScanState {
    /// True for `Done` and the three failure states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Done
                | ScanState::QrFailed
                | ScanState::FetchFailed
                | ScanState::ExtractionFailed
        )
    }

    /// True for the three failure states.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != ScanState::Done
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Start => f.write_str("reading QR code"),
            ScanState::QrResolved { url } => write!(f, "QR resolved: {url}"),
            ScanState::PageFetched { bytes } => write!(f, "receipt page fetched ({bytes} bytes)"),
            ScanState::ItemsExtracted { count } => write!(f, "{count} items extracted"),
            ScanState::Done => f.write_str("done"),
            ScanState::QrFailed => f.write_str("no QR code found"),
            ScanState::FetchFailed => f.write_str("receipt portal unreachable"),
            ScanState::ExtractionFailed => f.write_str("no items recognised"),
        }
    }
}

/// Called by the scanner as a run progresses.
///
/// `Send + Sync` because [`crate::scan_many`] drives several runs at once.
/// Every method has a no-op default.
pub trait ScanProgressCallback: Send + Sync {
    /// Once per run, before anything else. `source` is the path or URL.
    fn on_scan_start(&self, source: &str) {
        let _ = source;
    }

    /// On every state transition, terminal ones included.
    fn on_state(&self, state: &ScanState) {
        let _ = state;
    }

    /// After a successful run.
    fn on_scan_complete(&self, item_count: usize) {
        let _ = item_count;
    }

    /// After a failed run, with the rendered error.
    fn on_scan_error(&self, error: &str) {
        let _ = error;
    }
}

/// A callback that ignores everything.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
