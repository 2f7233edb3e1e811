//! Error types for the nfce2list library.
//!
//! Two tiers of error reflect two distinct failure modes:
//!
//! * [`ScanError`] (**fatal**): the scan run ends here. Only three kinds are
//!   produced by a run (`QrNotFound`, `Unreachable`, `ExtractionFailed`); the
//!   remaining variants come from building a config, a scanner or a runtime.
//!
//! * [`FetchError`] and [`LlmError`] (**stage-local**): a single stage failed.
//!   The orchestrator converts a `FetchError` into [`ScanError::Unreachable`]
//!   and absorbs an `LlmError` entirely, falling back to the layout
//!   heuristics.
//!
//! No run is retried automatically. Asking the user for a sharper photo or
//! trying again later is the caller's decision.

use thiserror::Error;

/// All fatal errors returned by the nfce2list library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Run errors ────────────────────────────────────────────────────────
    /// No decoder produced an `http` payload from the image, or the image
    /// could not be read at all.
    #[error("No receipt QR code found in '{input}': {detail}\nTry a sharper, well-lit photo of the QR code.")]
    QrNotFound { input: String, detail: String },

    /// The QR code was valid but the portal could not be reached.
    #[error("Could not reach the receipt portal at '{url}': {reason}")]
    Unreachable { url: String, reason: String },

    /// The page was fetched, but no strategy produced any items.
    #[error("Receipt page at '{url}' was fetched but no items could be extracted.\nThe issuing state may use a layout that is not recognised yet.")]
    ExtractionFailed { url: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The async runtime behind [`crate::scan_sync`] could not be started.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// The receipt URL the run got as far as, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            ScanError::Unreachable { url, .. } | ScanError::ExtractionFailed { url } => Some(url),
            _ => None,
        }
    }
}

/// A page retrieval failure. Converted into [`ScanError::Unreachable`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The portal answered with something other than `200 OK`.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// DNS, connect, TLS or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response headers arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// A failure in the LLM extraction stage.
///
/// Never fatal: logged, then the layout heuristics take over.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// No provider is configured or detectable from the environment.
    #[error("LLM provider '{provider}' is not available: {hint}")]
    Unavailable { provider: String, hint: String },

    /// The provider call returned an error.
    #[error("LLM request failed: {0}")]
    Request(String),

    /// The provider call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The page had no visible text worth sending.
    #[error("page has no visible text to send")]
    NoText,
}
