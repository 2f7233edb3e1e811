//! Layout heuristics: receipt page HTML → items, no network involved.
//!
//! Issuing states render the same receipt with different markup. Two
//! strategies cover the layouts seen in practice and run in order; the first
//! one that yields an item ends the search.
//!
//! 1. **Table header**: product tables (`#Prod`, `#tabResult`, then every
//!    other table). The first row is read as a header to locate the
//!    description and line-total columns. Without a recognisable header the
//!    description sits in column 1 (column 0 for two-column rows) and the
//!    price is the rightmost parsable amount among the other cells.
//! 2. **Span pairing**: elements with name-like classes (`txtTit`, `Nome`,
//!    `item`). The price comes from the text around the name inside its
//!    parent, or from the price-like element at the same position.
//!
//! Every strategy is a plain function over a parsed document, so calls are
//! independent and repeatable.

use crate::output::ReceiptItem;
use crate::pipeline::category::classify;
use crate::pipeline::clean::{clean_item_name, collapse_whitespace, is_summary_row};
use crate::pipeline::currency::{has_amount, to_amount};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// A strategy returns every item it can read, possibly none.
type Strategy = fn(&Html) -> Vec<ReceiptItem>;

/// Strategies in the order they are tried.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("table-header", extract_from_tables),
    ("span-pairing", extract_from_spans),
];

/// Which strategy ran and how much it found. Only logged.
#[derive(Debug)]
struct ExtractionAttempt {
    strategy: &'static str,
    items: usize,
}

/// Extract items from a receipt page. An empty result is not an error.
pub fn extract(html: &str) -> Vec<ReceiptItem> {
    let document = Html::parse_document(html);
    for &(strategy, run) in STRATEGIES {
        let items = run(&document);
        let attempt = ExtractionAttempt {
            strategy,
            items: items.len(),
        };
        debug!(?attempt, "layout strategy finished");
        if !items.is_empty() {
            return items;
        }
    }
    Vec::new()
}

fn make_item(raw_name: &str, price: f64) -> Option<ReceiptItem> {
    let name = clean_item_name(raw_name);
    if is_summary_row(&name) {
        return None;
    }
    ReceiptItem::new(&name, price, classify(&name))
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

// ── Strategy 1: table header ─────────────────────────────────────────────────

static PREFERRED_TABLES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#Prod, table#tabResult").unwrap());
static ALL_TABLES: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

/// Header labels of the description column, most specific first.
const NAME_HEADERS: &[&str] = &[
    "descrição",
    "descricao",
    "discriminação",
    "discriminacao",
    "produto",
    "nome",
    "item",
];

/// Header labels of the line-total column, most specific first.
const PRICE_HEADERS: &[&str] = &[
    "vl total",
    "vl. total",
    "vlr total",
    "vlr. total",
    "valor total",
    "total",
];

/// Column positions taken from a header row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Columns {
    name: usize,
    price: Option<usize>,
}

fn extract_from_tables(document: &Html) -> Vec<ReceiptItem> {
    let preferred: Vec<ElementRef<'_>> = document.select(&PREFERRED_TABLES).collect();
    let others = document
        .select(&ALL_TABLES)
        .filter(|t| !preferred.iter().any(|p| p.id() == t.id()));

    for table in preferred.iter().copied().chain(others) {
        let items = extract_table(table);
        if !items.is_empty() {
            debug!(
                table_id = table.value().id().unwrap_or(""),
                items = items.len(),
                "table yielded items"
            );
            return items;
        }
    }
    Vec::new()
}

fn extract_table(table: ElementRef<'_>) -> Vec<ReceiptItem> {
    let rows: Vec<Vec<ElementRef<'_>>> = table
        .select(&ROWS)
        .filter(|row| in_table(*row, table))
        .map(row_cells)
        .collect();

    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let header = header_columns(first);
    let skip_first = header.is_some() || first.iter().any(|c| c.value().name() == "th");
    let data_rows = if skip_first { &rows[1..] } else { &rows[..] };

    data_rows
        .iter()
        .filter_map(|cells| extract_row(cells, header))
        .collect()
}

/// True when `table` is the nearest enclosing table of `row`, so nested
/// tables are read on their own.
fn in_table(row: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
        .is_some_and(|e| e.id() == table.id())
}

fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .collect()
}

/// Longest cell text still read as a column label.
const MAX_HEADER_LABEL_CHARS: usize = 24;

/// Locate the description and line-total columns in a header row.
///
/// `None` unless a description column is found; a lone "total" label is not
/// enough to call a row a header. A row holding an amount is data, and only
/// short cells count as labels, so a product named "PRODUTO NATURAL…" is
/// never mistaken for a header.
fn header_columns(cells: &[ElementRef<'_>]) -> Option<Columns> {
    let texts: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
    if texts.iter().any(|t| has_amount(t)) {
        return None;
    }
    let labels: Vec<Option<String>> = texts
        .iter()
        .map(|t| (t.chars().count() <= MAX_HEADER_LABEL_CHARS).then(|| t.to_lowercase()))
        .collect();
    let has_label = |i: usize, keyword: &str| {
        labels[i]
            .as_deref()
            .is_some_and(|label| label.contains(keyword))
    };

    let name = NAME_HEADERS
        .iter()
        .find_map(|k| (0..labels.len()).find(|&i| has_label(i, *k)))?;
    let price = PRICE_HEADERS
        .iter()
        .find_map(|k| (0..labels.len()).find(|&i| i != name && has_label(i, *k)));

    Some(Columns { name, price })
}

fn extract_row(cells: &[ElementRef<'_>], header: Option<Columns>) -> Option<ReceiptItem> {
    if cells.len() < 2 {
        return None;
    }

    let name_col = match header {
        Some(columns) => columns.name,
        None if cells.len() >= 3 => 1,
        None => 0,
    };
    let name_cell = cells.get(name_col)?;

    let header_price = header.and_then(|c| c.price);
    let candidates = header_price
        .into_iter()
        .chain((0..cells.len()).rev().filter(|&i| i != name_col && Some(i) != header_price));

    let price = candidates
        .filter_map(|i| cells.get(i))
        .map(|cell| to_amount(&element_text(*cell)))
        .find(|amount| *amount > 0.0)
        .unwrap_or(0.0);

    make_item(&element_text(*name_cell), price)
}

// ── Strategy 2: span pairing ─────────────────────────────────────────────────

static WITH_CLASS: Lazy<Selector> = Lazy::new(|| Selector::parse("[class]").unwrap());
static RE_NAME_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nome|txtTit|item").unwrap());
static RE_PRICE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)vl|vlrItem|vTotLiq|valor").unwrap());

fn class_of<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().attr("class").unwrap_or("")
}

fn is_price_like(element: &ElementRef<'_>) -> bool {
    RE_PRICE_CLASS.is_match(class_of(element))
}

fn is_name_like(element: &ElementRef<'_>) -> bool {
    let class = class_of(element);
    RE_NAME_CLASS.is_match(class) && !RE_PRICE_CLASS.is_match(class)
}

/// Matching elements that contain no other matching element.
fn innermost<'a>(
    document: &'a Html,
    matches: fn(&ElementRef<'_>) -> bool,
) -> Vec<ElementRef<'a>> {
    document
        .select(&WITH_CLASS)
        .filter(|e| matches(e))
        .filter(|e| {
            !e.descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(|d| matches(&d))
        })
        .collect()
}

fn extract_from_spans(document: &Html) -> Vec<ReceiptItem> {
    let names = innermost(document, is_name_like);
    let prices = innermost(document, is_price_like);

    // Pairing by position is only trusted when both lists line up one to one.
    let positional = names.len() == prices.len();
    if !positional && !names.is_empty() {
        debug!(
            names = names.len(),
            prices = prices.len(),
            "name/price counts differ; positional pairing disabled"
        );
    }

    names
        .iter()
        .enumerate()
        .filter_map(|(i, name_el)| {
            let price = sibling_text(*name_el)
                .filter(|text| has_amount(text))
                .map(|text| to_amount(&text))
                .or_else(|| {
                    positional
                        .then(|| prices.get(i))
                        .flatten()
                        .map(|p| to_amount(&element_text(*p)))
                })
                .unwrap_or(0.0);
            make_item(&element_text(*name_el), price)
        })
        .collect()
}

/// Text of everything in the parent container except the element itself.
fn sibling_text(element: ElementRef<'_>) -> Option<String> {
    let parent = element.parent()?;
    let mut out = String::new();
    for child in parent.children() {
        if child.id() == element.id() {
            continue;
        }
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            out.push_str(&element_text(child_el));
        }
        out.push(' ');
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Category;

    fn names(items: &[ReceiptItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn header_table() {
        let html = r#"<table>
            <tr><th>Código</th><th>Descrição</th><th>Qtd</th><th>Vl Total</th></tr>
            <tr><td>001</td><td>Arroz 5kg</td><td>1</td><td>25,90</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Arroz 5kg");
        assert!((items[0].price - 25.90).abs() < 1e-9);
        assert_eq!(items[0].category, Category::Mercado);
        assert!(!items[0].purchased);
    }

    #[test]
    fn product_named_like_a_header_is_kept() {
        let html = r#"<table id="tabResult">
          <tr id="Item + 1">
            <td><span class="txtTit">PRODUTO NATURAL GRANOLA 1KG</span>
              <span class="RCod">(Código: 501 )</span></td>
            <td class="txtTit noWrap">Vl. Total<br><span class="valor">19,90</span></td>
          </tr>
          <tr id="Item + 2">
            <td><span class="txtTit">ARROZ TIPO 1 5KG</span>
              <span class="RCod">(Código: 502 )</span></td>
            <td class="txtTit noWrap">Vl. Total<br><span class="valor">25,90</span></td>
          </tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["PRODUTO NATURAL GRANOLA 1KG", "ARROZ TIPO 1 5KG"]);
        assert!((items[0].price - 19.90).abs() < 1e-9);
    }

    #[test]
    fn long_first_cell_without_amount_is_data() {
        let html = r#"<table>
            <tr><td>1</td><td>Item promocional leve 3 pague 2 sabonete</td><td>-</td></tr>
            <tr><td>2</td><td>Banana prata</td><td>4,10</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Item promocional leve 3 pague 2 sabonete");
    }

    #[test]
    fn nome_header_locates_description_column() {
        let html = r#"<table>
            <tr><td>Nome</td><td>Cód</td><td>Qtd</td><td>Vl Total</td></tr>
            <tr><td>Presunto cozido</td><td>778</td><td>1</td><td>9,80</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Presunto cozido"]);
        assert!((items[0].price - 9.80).abs() < 1e-9);
        assert_eq!(items[0].category, Category::Frios);
    }

    #[test]
    fn header_price_column_beats_rightmost() {
        let html = r#"<table>
            <tr><td>Produto</td><td>Vl. Total</td><td>Obs</td></tr>
            <tr><td>Feijão preto</td><td>8,49</td><td>1,00</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(items.len(), 1);
        assert!((items[0].price - 8.49).abs() < 1e-9);
    }

    #[test]
    fn tab_result_layout() {
        let html = r#"<table id="tabResult">
          <tr id="Item + 1">
            <td valign="top"><span class="txtTit">AGUA MIN LEVITY 1,5L</span>
              <span class="RCod">(Código: 12345 )</span><br>
              <span class="Rqtd"><strong>Qtde.:</strong>2</span>
              <span class="RUN"><strong>UN: </strong>UN</span>
              <span class="RvlUnit"><strong>Vl. Unit.:</strong>&nbsp;3,19</span></td>
            <td align="right" valign="top" class="txtTit noWrap">Vl. Total<br>
              <span class="valor">6,38</span></td>
          </tr>
          <tr id="Item + 2">
            <td valign="top"><span class="txtTit">PICANHA BOVINA KG</span>
              <span class="RCod">(Código: 777 )</span></td>
            <td class="txtTit noWrap">Vl. Total<br><span class="valor">1.089,90</span></td>
          </tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["AGUA MIN LEVITY 1,5L", "PICANHA BOVINA KG"]);
        assert!((items[0].price - 6.38).abs() < 1e-9);
        assert!((items[1].price - 1089.90).abs() < 1e-9);
        assert_eq!(items[1].category, Category::Acougue);
    }

    #[test]
    fn preferred_table_comes_first() {
        let html = r#"
            <table><tr><td>Emitente</td><td>Mercado Bom Preço</td><td>12,00</td></tr></table>
            <table id="Prod">
              <tr><th>Item</th><th>Descrição</th><th>Valor Total</th></tr>
              <tr><td>1</td><td>Banana prata</td><td>4,10</td></tr>
            </table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Banana prata"]);
        assert_eq!(items[0].category, Category::Hortifruti);
    }

    #[test]
    fn summary_and_short_rows_are_dropped() {
        let html = r#"<table>
            <tr><th>Cód</th><th>Descrição</th><th>Vl Total</th></tr>
            <tr><td>1</td><td>Detergente neutro</td><td>2,99</td></tr>
            <tr><td>2</td><td>X</td><td>1,00</td></tr>
            <tr><td colspan="3">lonely cell</td></tr>
            <tr><td></td><td>Valor total R$</td><td>3,99</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Detergente neutro"]);
        assert_eq!(items[0].category, Category::Limpeza);
    }

    #[test]
    fn missing_price_defaults_to_zero() {
        let html = r#"<table>
            <tr><th>Código</th><th>Descrição</th><th>Vl Total</th></tr>
            <tr><td>9</td><td>Tomate italiano</td><td>-</td></tr>
        </table>"#;
        let items = extract(html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, 0.0);
    }

    #[test]
    fn nested_table_rows_belong_to_inner_table() {
        let html = r#"<table id="layout"><tr><td>
              <table><tr><th>Descrição</th><th>Total</th></tr>
                     <tr><td>Queijo prato</td><td>15,80</td></tr></table>
            </td></tr></table>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Queijo prato"]);
        assert_eq!(items[0].category, Category::Frios);
    }

    #[test]
    fn span_pairing_uses_parent_text() {
        let html = r#"<div id="itens">
            <div class="linha"><span class="txtNome">ARROZ TIPO 1</span>
                <span class="qtd">1 UN</span><span class="vlrItem">25,90</span></div>
            <div class="linha"><span class="txtNome">SABAO EM PO</span>
                <span class="qtd">2 UN</span><span class="vlrItem">18,00</span></div>
        </div>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["ARROZ TIPO 1", "SABAO EM PO"]);
        assert!((items[0].price - 25.90).abs() < 1e-9);
        assert!((items[1].price - 18.00).abs() < 1e-9);
        assert_eq!(items[1].category, Category::Limpeza);
    }

    #[test]
    fn span_pairing_positional_when_counts_match() {
        let html = r#"
            <ul><li><span class="itemNome">Café torrado</span></li>
                <li><span class="itemNome">Leite integral</span></li></ul>
            <ul><li><span class="vTotLiq">16,90</span></li>
                <li><span class="vTotLiq">5,49</span></li></ul>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Café torrado", "Leite integral"]);
        assert!((items[0].price - 16.90).abs() < 1e-9);
        assert!((items[1].price - 5.49).abs() < 1e-9);
    }

    #[test]
    fn span_pairing_no_positional_on_count_mismatch() {
        let html = r#"
            <p><span class="itemNome">Café torrado</span></p>
            <p><span class="itemNome">Leite integral</span></p>
            <p><span class="vTotLiq">16,90</span></p>"#;
        let items = extract(html);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.price == 0.0));
    }

    #[test]
    fn container_classes_are_not_names() {
        let html = r#"<div class="items"><div class="item-row">
            <span class="txtTit">Alface crespa</span><span class="valor">3,50</span>
        </div></div>"#;
        let items = extract(html);
        assert_eq!(names(&items), vec!["Alface crespa"]);
    }

    #[test]
    fn nothing_recognisable_is_empty() {
        assert!(extract("").is_empty());
        assert!(extract("<html><body><p>Consulta indisponível</p></body></html>").is_empty());
    }

    #[test]
    fn repeated_extraction_is_identical() {
        let html = r#"<table id="tabResult"><tr>
            <td><span class="txtTit">Frango congelado</span></td>
            <td><span class="valor">12,50</span></td></tr></table>"#;
        assert_eq!(extract(html), extract(html));
    }
}
