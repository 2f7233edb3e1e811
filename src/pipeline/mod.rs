//! Pipeline stages for receipt scanning.
//!
//! Each submodule is one step and can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! photo ──▶ qr ──▶ fetch ──▶ llm ──(empty/error)──▶ layout
//!          (URL)   (HTML)   (items)                 (items)
//! ```
//!
//! 1. [`qr`]     decode the receipt URL; CPU-bound, run in `spawn_blocking`
//! 2. [`fetch`]  GET the portal page with a browser identity
//! 3. [`llm`]    ask a chat model for the items in the page text
//! 4. [`layout`] table and span heuristics, the offline fallback
//!
//! [`currency`], [`category`] and [`clean`] are the helpers both extraction
//! paths share.

pub mod category;
pub mod clean;
pub mod currency;
pub mod fetch;
pub mod layout;
pub mod llm;
pub mod qr;
