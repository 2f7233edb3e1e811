//! Keyword-based category inference for receipt item names.
//!
//! The table is scanned in order and the first keyword contained in the
//! lower-cased name wins, so order matters: staples come before produce so
//! that `macarrão` is not caught by `maca`, and meats come first so that
//! `file de frango` is never filed as anything else.

use crate::output::Category;

/// Ordered `(keyword, category)` pairs. Both accented and unaccented
/// spellings are listed because receipts use either.
static KEYWORDS: &[(&str, Category)] = &[
    // Açougue
    ("frango", Category::Acougue),
    ("carne", Category::Acougue),
    ("picanha", Category::Acougue),
    ("file", Category::Acougue),
    ("filé", Category::Acougue),
    ("linguiça", Category::Acougue),
    ("linguica", Category::Acougue),
    // Frios
    ("queijo", Category::Frios),
    ("presunto", Category::Frios),
    ("mortadela", Category::Frios),
    ("iogurte", Category::Frios),
    ("cream", Category::Frios),
    // Mercado
    ("leite", Category::Mercado),
    ("manteiga", Category::Mercado),
    ("oleo", Category::Mercado),
    ("óleo", Category::Mercado),
    ("azeite", Category::Mercado),
    ("arroz", Category::Mercado),
    ("feijao", Category::Mercado),
    ("feijão", Category::Mercado),
    ("macarrao", Category::Mercado),
    ("macarrão", Category::Mercado),
    ("farinha", Category::Mercado),
    ("açúcar", Category::Mercado),
    ("acucar", Category::Mercado),
    ("café", Category::Mercado),
    ("cafe", Category::Mercado),
    ("biscoito", Category::Mercado),
    ("bolacha", Category::Mercado),
    ("pao", Category::Mercado),
    ("pão", Category::Mercado),
    ("refrigerante", Category::Mercado),
    ("suco", Category::Mercado),
    // Limpeza
    ("sabao", Category::Limpeza),
    ("sabão", Category::Limpeza),
    ("detergente", Category::Limpeza),
    ("desinfetante", Category::Limpeza),
    ("amaciante", Category::Limpeza),
    ("shampoo", Category::Limpeza),
    ("condicionador", Category::Limpeza),
    // Hortifruti
    ("tomate", Category::Hortifruti),
    ("alface", Category::Hortifruti),
    ("banana", Category::Hortifruti),
    ("maca", Category::Hortifruti),
    ("maçã", Category::Hortifruti),
    ("laranja", Category::Hortifruti),
    ("limao", Category::Hortifruti),
    ("limão", Category::Hortifruti),
    ("cenoura", Category::Hortifruti),
    ("batata", Category::Hortifruti),
    ("cebola", Category::Hortifruti),
    ("alho", Category::Hortifruti),
];

/// Classify an item name. Falls back to [`Category::Mercado`].
pub fn classify(name: &str) -> Category {
    let lower = name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|&(_, cat)| cat)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meat() {
        assert_eq!(classify("Frango a Passarinho"), Category::Acougue);
        assert_eq!(classify("PICANHA BOVINA KG"), Category::Acougue);
    }

    #[test]
    fn unknown_falls_back_to_mercado() {
        assert_eq!(classify("Item Desconhecido XYZ"), Category::Mercado);
        assert_eq!(classify(""), Category::Mercado);
    }

    #[test]
    fn staples_shadow_produce() {
        // "macarrao" contains "maca"; the staple entry comes first.
        assert_eq!(classify("MACARRAO ESPAGUETE 500G"), Category::Mercado);
        assert_eq!(classify("MACA FUJI KG"), Category::Hortifruti);
    }

    #[test]
    fn accented_upper_case_names() {
        assert_eq!(classify("SABÃO EM PÓ 1KG"), Category::Limpeza);
        assert_eq!(classify("LIMÃO TAHITI"), Category::Hortifruti);
    }

    #[test]
    fn deli_and_cleaning() {
        assert_eq!(classify("Queijo Mussarela Fatiado"), Category::Frios);
        assert_eq!(classify("DETERGENTE LIQ 500ML"), Category::Limpeza);
    }

    #[test]
    fn repeated_calls_agree() {
        let a = classify("Arroz 5kg");
        let b = classify("Arroz 5kg");
        assert_eq!(a, b);
        assert_eq!(a, Category::Mercado);
    }
}
