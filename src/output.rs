//! Output types: the items a scan produces and the run statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an item name, in characters.
pub const MAX_NAME_CHARS: usize = 80;

/// Shopping category assigned to a receipt line.
///
/// Serialised with the Portuguese labels the shopping-list app displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    /// General grocery. The fallback for anything unrecognised.
    #[default]
    Mercado,
    Hortifruti,
    #[serde(rename = "Açougue")]
    Acougue,
    Frios,
    Limpeza,
    Padaria,
    Outros,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Mercado,
        Category::Hortifruti,
        Category::Acougue,
        Category::Frios,
        Category::Limpeza,
        Category::Padaria,
        Category::Outros,
    ];

    /// The display label, accents included.
    pub fn label(self) -> &'static str {
        match self {
            Category::Mercado => "Mercado",
            Category::Hortifruti => "Hortifruti",
            Category::Acougue => "Açougue",
            Category::Frios => "Frios",
            Category::Limpeza => "Limpeza",
            Category::Padaria => "Padaria",
            Category::Outros => "Outros",
        }
    }

    /// Parse a label, ignoring case and accents (`"acougue"` → `Açougue`).
    ///
    /// Returns `None` for anything outside the fixed set.
    pub fn from_label(label: &str) -> Option<Category> {
        let wanted = fold_accents(label.trim());
        Category::ALL
            .into_iter()
            .find(|c| fold_accents(c.label()) == wanted)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Lower-case and strip the Portuguese diacritics that show up in labels.
fn fold_accents(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// One purchased line extracted from a receipt.
///
/// Only constructed through [`ReceiptItem::new`], which enforces the name and
/// price invariants. Items are handed to the caller as-is; persisting them is
/// the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Trimmed product name, 2–80 characters.
    pub name: String,
    /// Line total in BRL. `0.0` when the page showed no price near the name.
    pub price: f64,
    pub category: Category,
    /// Always `false` at extraction time.
    pub purchased: bool,
}

impl ReceiptItem {
    /// Build an item, or `None` when the name is too short to be a product.
    ///
    /// The name is trimmed and cut to [`MAX_NAME_CHARS`]; a negative or
    /// non-finite price becomes `0.0`.
    pub fn new(name: &str, price: f64, category: Category) -> Option<Self> {
        let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
        let name = name.trim_end().to_string();
        if name.chars().count() < 2 {
            return None;
        }
        let price = if price.is_finite() && price > 0.0 { price } else { 0.0 };
        Some(Self {
            name,
            price,
            category,
            purchased: false,
        })
    }
}

/// Timing and size statistics for one scan run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Time spent locating and decoding the QR code (0 for URL scans).
    pub decode_duration_ms: u64,
    /// Time spent retrieving the receipt page.
    pub fetch_duration_ms: u64,
    /// Time spent in the LLM stage and layout heuristics combined.
    pub extract_duration_ms: u64,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Size of the fetched page body.
    pub html_bytes: usize,
}

/// The result of a successful scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    /// The receipt URL decoded from the QR code.
    pub url: String,
    /// Extracted items, in page order. Never empty.
    pub items: Vec<ReceiptItem>,
    pub stats: ScanStats,
}

impl ScanOutput {
    /// Sum of all item prices.
    pub fn total_price(&self) -> f64 {
        self.items.iter().map(|i| i.price).sum()
    }
}
