//! Text cleanup shared by the extraction strategies.
//!
//! Portal markup is noisy: names arrive glued to product codes and
//! quantities, summary lines sit in the same table as products, and the LLM
//! wraps its JSON in fences despite being told not to. Each rule here is a
//! small pure function so the strategies stay readable.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

// ── Item names ───────────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Metadata that portals append to the product description. Everything from
/// the first marker on is dropped.
static RE_NAME_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*c[óo]d|qtde\.|qtd\.|\bun\s*:|vl\.\s*unit|vl\.\s*total").unwrap()
});

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Reduce a raw name cell to the product description.
///
/// `"AGUA MIN LEVITY 1,5L(Código:12345)Qtde.:1"` → `"AGUA MIN LEVITY 1,5L"`.
pub fn clean_item_name(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    let cut = match RE_NAME_METADATA.find(&collapsed) {
        Some(m) => &collapsed[..m.start()],
        None => collapsed.as_str(),
    };
    cut.trim().to_string()
}

/// Lower-cased prefixes of receipt summary lines that share markup with the
/// product rows.
static SUMMARY_PREFIXES: &[&str] = &[
    "total",
    "subtotal",
    "vl. total",
    "vl.total",
    "valor total",
    "valor a pagar",
    "qtd. total de itens",
    "forma de pagamento",
    "troco",
];

/// True for totals, payment and change lines.
pub fn is_summary_row(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    SUMMARY_PREFIXES.iter().any(|p| lower.starts_with(p))
}

// ── Visible text ─────────────────────────────────────────────────────────────

/// Elements whose content never renders as page text.
const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "nav", "template", "iframe", "svg",
];

/// Elements that start a new line in the rendered page.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dl", "dt", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "main", "ol", "p", "section", "table", "tbody",
    "thead", "tfoot", "tr", "ul",
];

/// Plain visible text of a page, one rendered line per output line.
///
/// Scripts, styles, navigation and the document head are dropped. Blank
/// lines are removed and whitespace inside each line collapsed, which keeps
/// the LLM input small.
pub fn visible_text(document: &Html) -> String {
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();
        if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        }
        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            out.push('\n');
        } else {
            out.push(' ');
        }
        collect_text(child_el, out);
        if block {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ── LLM responses ────────────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n?(.*?)\r?\n?```\s*$").unwrap());

/// Remove a surrounding ```` ```json ```` fence, if any.
pub fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}
