//! Scan entry points: photo or URL → items.
//!
//! A run moves through the states of [`ScanState`]:
//!
//! ```text
//! Start ─▶ QrResolved ─▶ PageFetched ─▶ ItemsExtracted ─▶ Done
//!   │           │             │
//!   ▼           ▼             ▼
//! QrFailed   FetchFailed   ExtractionFailed
//! ```
//!
//! Extraction asks the LLM first because it copes with layouts nobody has
//! seen yet. When the LLM is unavailable, fails, or returns nothing usable,
//! the deterministic layout heuristics take over. Only when both come back
//! empty does the run fail.
//!
//! Nothing is retried. Every run is independent, so [`scan_many`] can drive
//! several at once.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::output::{ReceiptItem, ScanOutput, ScanStats};
use crate::pipeline::fetch::{HttpPageFetcher, PageFetcher};
use crate::pipeline::llm::{self, ProviderGenerator, TextGenerator};
use crate::pipeline::{layout, qr};
use crate::progress::ScanState;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the receipt photo comes from.
enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Decoded(DynamicImage),
}

/// Runs scans with one configuration, HTTP client and LLM generator.
///
/// Build once and reuse: the HTTP client pools connections and the provider
/// is resolved only at construction.
///
/// # Example
/// ```rust,no_run
/// use nfce2list::{ScanConfig, Scanner};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scanner = Scanner::new(ScanConfig::default())?;
/// let output = scanner.scan_path("cupom.jpg").await?;
/// for item in &output.items {
///     println!("{} ({}): {:.2}", item.name, item.category, item.price);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Scanner {
    config: ScanConfig,
    fetcher: Arc<dyn PageFetcher>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Scanner {
    /// Build a scanner.
    ///
    /// The LLM provider is resolved here. If none can be found the scanner is
    /// still built and runs the layout heuristics only.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let fetcher = HttpPageFetcher::new(&config)
            .map_err(|e| ScanError::InvalidConfig(format!("HTTP client: {e}")))?;

        let generator: Option<Arc<dyn TextGenerator>> = if config.use_llm {
            match llm::resolve_provider(&config) {
                Ok(provider) => Some(Arc::new(ProviderGenerator::new(provider, &config))),
                Err(e) => {
                    warn!("LLM extraction disabled: {}", e);
                    None
                }
            }
        } else {
            debug!("LLM extraction disabled by configuration");
            None
        };

        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            generator,
        })
    }

    /// Replace the page fetcher (caching clients, tests).
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the LLM stage with any [`TextGenerator`].
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Drop the LLM stage; only the layout heuristics run.
    pub fn without_generator(mut self) -> Self {
        self.generator = None;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// True when the LLM stage will be tried.
    pub fn has_llm(&self) -> bool {
        self.generator.is_some()
    }

    /// Scan an image path, or fetch directly when `input` is an `http(s)` URL.
    pub async fn scan_input(&self, input: &str) -> Result<ScanOutput, ScanError> {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.scan_url(trimmed).await
        } else {
            self.scan_path(trimmed).await
        }
    }

    /// Scan a photo on disk.
    pub async fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanOutput, ScanError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        self.scan_source(&label, ImageSource::Path(path.to_path_buf()))
            .await
    }

    /// Scan an encoded JPEG or PNG held in memory.
    pub async fn scan_bytes(&self, bytes: &[u8]) -> Result<ScanOutput, ScanError> {
        self.scan_source("<memory>", ImageSource::Bytes(bytes.to_vec()))
            .await
    }

    /// Scan an already decoded image.
    pub async fn scan_image(&self, image: DynamicImage) -> Result<ScanOutput, ScanError> {
        self.scan_source("<image>", ImageSource::Decoded(image)).await
    }

    /// Skip QR decoding and start from a receipt URL read elsewhere.
    pub async fn scan_url(&self, url: &str) -> Result<ScanOutput, ScanError> {
        let total_start = Instant::now();
        let url = url.trim().to_string();
        info!("Starting scan: {}", url);
        self.notify_start(&url);
        self.emit(ScanState::QrResolved { url: url.clone() });
        self.fetch_and_extract(url, ScanStats::default(), total_start)
            .await
    }

    /// Scan several inputs at once, bounded by `config.concurrency`.
    ///
    /// Results come back in input order; one failure does not affect the others.
    pub async fn scan_many<I, S>(&self, inputs: I) -> Vec<Result<ScanOutput, ScanError>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inputs: Vec<String> = inputs
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        debug!("Scanning {} inputs, {} at a time", inputs.len(), self.config.concurrency);

        stream::iter(inputs.iter())
            .map(|input| self.scan_input(input))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    // ── Run stages ───────────────────────────────────────────────────────

    async fn scan_source(&self, label: &str, source: ImageSource) -> Result<ScanOutput, ScanError> {
        let total_start = Instant::now();
        info!("Starting scan: {}", label);
        self.notify_start(label);
        self.emit(ScanState::Start);

        // ── Step 1: QR → URL ─────────────────────────────────────────────
        let decode_start = Instant::now();
        let url = match decode_qr(label, source).await {
            Ok(url) => url,
            Err(e) => return Err(self.fail(ScanState::QrFailed, e)),
        };
        let stats = ScanStats {
            decode_duration_ms: decode_start.elapsed().as_millis() as u64,
            ..Default::default()
        };
        info!("QR resolved to {} in {}ms", url, stats.decode_duration_ms);
        self.emit(ScanState::QrResolved { url: url.clone() });

        self.fetch_and_extract(url, stats, total_start).await
    }

    async fn fetch_and_extract(
        &self,
        url: String,
        mut stats: ScanStats,
        total_start: Instant,
    ) -> Result<ScanOutput, ScanError> {
        // ── Step 2: URL → HTML ───────────────────────────────────────────
        let fetch_start = Instant::now();
        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                let err = ScanError::Unreachable {
                    url,
                    reason: e.to_string(),
                };
                return Err(self.fail(ScanState::FetchFailed, err));
            }
        };
        stats.fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
        stats.html_bytes = html.len();
        self.emit(ScanState::PageFetched { bytes: html.len() });

        // ── Step 3: HTML → items ─────────────────────────────────────────
        let extract_start = Instant::now();
        let items = self.extract_items(&html).await;
        stats.extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        if items.is_empty() {
            return Err(self.fail(
                ScanState::ExtractionFailed,
                ScanError::ExtractionFailed { url },
            ));
        }

        self.emit(ScanState::ItemsExtracted { count: items.len() });
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Scan complete: {} items from {} in {}ms",
            items.len(),
            url,
            stats.total_duration_ms
        );

        self.emit(ScanState::Done);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_complete(items.len());
        }

        Ok(ScanOutput { url, items, stats })
    }

    /// LLM first, layout heuristics when it yields nothing.
    async fn extract_items(&self, html: &str) -> Vec<ReceiptItem> {
        if let Some(ref generator) = self.generator {
            match llm::extract_via_llm(generator.as_ref(), html, &self.config).await {
                Ok(items) if !items.is_empty() => return items,
                Ok(_) => info!("LLM found no items, trying layout heuristics"),
                Err(e) => warn!("LLM extraction failed, trying layout heuristics: {}", e),
            }
        }
        layout::extract(html)
    }

    // ── Progress helpers ─────────────────────────────────────────────────

    fn notify_start(&self, source: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_start(source);
        }
    }

    fn emit(&self, state: ScanState) {
        debug!(state = %state, "scan state");
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_state(&state);
        }
    }

    fn fail(&self, state: ScanState, err: ScanError) -> ScanError {
        warn!("Scan failed: {}", err);
        self.emit(state);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_scan_error(&err.to_string());
        }
        err
    }
}

/// Read the image and run the decoders off the async runtime.
async fn decode_qr(label: &str, source: ImageSource) -> Result<String, ScanError> {
    let decoded = tokio::task::spawn_blocking(move || -> Result<Option<String>, String> {
        let image = match source {
            ImageSource::Path(path) => {
                image::open(&path).map_err(|e| format!("cannot read image: {e}"))?
            }
            ImageSource::Bytes(bytes) => {
                image::load_from_memory(&bytes).map_err(|e| format!("cannot decode image: {e}"))?
            }
            ImageSource::Decoded(image) => image,
        };
        Ok(qr::resolve_url(&image))
    })
    .await;

    let detail = match decoded {
        Ok(Ok(Some(url))) => return Ok(url),
        Ok(Ok(None)) => "no decoder found a QR code holding a URL".to_string(),
        Ok(Err(detail)) => detail,
        Err(e) => format!("decoder task failed: {e}"),
    };
    Err(ScanError::QrNotFound {
        input: label.to_string(),
        detail,
    })
}

// ── Free functions ───────────────────────────────────────────────────────

/// Scan one input (image path or receipt URL).
///
/// This is the primary entry point for one-off scans. Build a [`Scanner`]
/// instead when scanning repeatedly.
///
/// # Errors
/// - [`ScanError::QrNotFound`]: the image holds no readable receipt QR code
/// - [`ScanError::Unreachable`]: the portal could not be fetched
/// - [`ScanError::ExtractionFailed`]: the page had no recognisable items
pub async fn scan(input: impl AsRef<str>, config: &ScanConfig) -> Result<ScanOutput, ScanError> {
    Scanner::new(config.clone())?
        .scan_input(input.as_ref())
        .await
}

/// Scan several inputs concurrently, results in input order.
///
/// The outer `Err` only reports a scanner that could not be built.
pub async fn scan_many<I, S>(
    inputs: I,
    config: &ScanConfig,
) -> Result<Vec<Result<ScanOutput, ScanError>>, ScanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let scanner = Scanner::new(config.clone())?;
    Ok(scanner.scan_many(inputs).await)
}

/// Synchronous wrapper around [`scan`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync(input: impl AsRef<str>, config: &ScanConfig) -> Result<ScanOutput, ScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(scan(input, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;

    struct StaticPage(&'static str);

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    fn offline_scanner(page: &'static str) -> Scanner {
        let config = ScanConfig::builder().use_llm(false).build().unwrap();
        Scanner::new(config)
            .unwrap()
            .with_fetcher(Arc::new(StaticPage(page)))
    }

    #[test]
    fn use_llm_false_builds_without_generator() {
        let scanner = offline_scanner("");
        assert!(!scanner.has_llm());
    }

    #[tokio::test]
    async fn url_scan_skips_decoding() {
        let scanner = offline_scanner(
            r#"<table id="tabResult"><tr><td><span class="txtTit">Pão francês</span></td>
               <td><span class="valor">7,20</span></td></tr></table>"#,
        );
        let out = scanner.scan_url(" http://portal/nfce?p=1 ").await.unwrap();
        assert_eq!(out.url, "http://portal/nfce?p=1");
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.stats.decode_duration_ms, 0);
        assert!(out.stats.html_bytes > 0);
    }

    #[tokio::test]
    async fn empty_page_is_extraction_failure() {
        let scanner = offline_scanner("<html><body>Nota não encontrada</body></html>");
        let err = scanner.scan_url("http://portal/nfce?p=2").await.unwrap_err();
        assert!(matches!(err, ScanError::ExtractionFailed { ref url } if url == "http://portal/nfce?p=2"));
    }

    #[tokio::test]
    async fn unreadable_bytes_are_qr_not_found() {
        let scanner = offline_scanner("");
        let err = scanner.scan_bytes(b"not an image").await.unwrap_err();
        match err {
            ScanError::QrNotFound { input, detail } => {
                assert_eq!(input, "<memory>");
                assert!(detail.contains("cannot decode image"), "got: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_qr_not_found() {
        let scanner = offline_scanner("");
        let err = scanner
            .scan_input("/definitely/not/here/cupom.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::QrNotFound { .. }));
    }
}
