//! The instruction sent to the LLM extraction stage.
//!
//! Kept apart from the call logic so it can be read and tested on its own.
//! Callers can override it via [`crate::config::ScanConfig::system_prompt`].

/// Default system prompt for turning receipt page text into items.
pub const RECEIPT_EXTRACTION_PROMPT: &str = r#"You read the text of a Brazilian electronic consumer receipt (NFC-e) page and list the products that were bought.

Rules:

1. ONLY PRODUCT LINES
   - Include every purchased product line, in the order it appears
   - Exclude totals, subtotals, item counts, taxes (tributos), discounts and surcharges
   - Exclude merchant data (name, CNPJ, address), consumer data, payment method, change (troco), access key, protocol and footer text

2. FIELDS
   - "name": the product description only, without code, quantity, unit or unit price
   - "category": exactly one of "Mercado", "Hortifruti", "Açougue", "Frios", "Limpeza", "Padaria", "Outros"
   - "price": the line TOTAL as a number with a dot as decimal separator (for "1.234,56" write 1234.56), never the unit price; 0 when absent

3. OUTPUT FORMAT
   - Output ONLY a JSON array of objects with the keys "name", "category" and "price"
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary
   - Output [] when the text contains no products"#;

/// The user turn: the page text the model has to read.
pub fn receipt_user_message(page_text: &str) -> String {
    format!("Receipt page text:\n\n{page_text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Category;

    #[test]
    fn prompt_lists_every_category() {
        for label in Category::ALL.map(Category::label) {
            assert!(
                RECEIPT_EXTRACTION_PROMPT.contains(&format!("\"{label}\"")),
                "prompt is missing {label}"
            );
        }
    }

    #[test]
    fn prompt_asks_for_line_totals_as_json() {
        assert!(RECEIPT_EXTRACTION_PROMPT.contains("JSON array"));
        assert!(RECEIPT_EXTRACTION_PROMPT.contains("line TOTAL"));
    }

    #[test]
    fn user_message_carries_text() {
        let msg = receipt_user_message("ARROZ 25,90");
        assert!(msg.ends_with("ARROZ 25,90"));
    }
}
