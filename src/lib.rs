//! # nfce2list
//!
//! Turn a photo of a Brazilian NFC-e receipt into a categorised item list.
//!
//! The QR code on every NFC-e points at the issuing state's tax portal,
//! where the full receipt is published. This crate reads the QR code, fetches
//! that page and pulls the purchased items out of it, ready to drop into a
//! shopping list.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. QR       rqrr → thresholded rqrr → rxing (spawn_blocking)
//!  ├─ 2. Fetch    GET the portal page (15 s, browser UA, lax TLS)
//!  ├─ 3. LLM      visible page text → JSON items (any edgequake-llm provider)
//!  ├─ 4. Layout   table-header and span-pairing heuristics when 3 yields nothing
//!  └─ 5. Output   items with name, price (BRL) and category
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nfce2list::{scan, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …;
//!     // without one the layout heuristics still run.
//!     let config = ScanConfig::default();
//!     let output = scan("cupom.jpg", &config).await?;
//!     for item in &output.items {
//!         println!("{:<40} {:<10} {:>8.2}", item.name, item.category, item.price);
//!     }
//!     eprintln!("total: {:.2}", output.total_price());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nfce2list` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! nfce2list = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{FetchError, LlmError, ScanError};
pub use output::{Category, ReceiptItem, ScanOutput, ScanStats};
pub use pipeline::category::classify;
pub use pipeline::currency::to_amount;
pub use pipeline::fetch::{HttpPageFetcher, PageFetcher};
pub use pipeline::layout::extract;
pub use pipeline::llm::{extract_via_llm, ProviderGenerator, TextGenerator};
pub use pipeline::qr::resolve_url;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback, ScanState};
pub use scan::{scan, scan_many, scan_sync, Scanner};
