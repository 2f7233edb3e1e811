//! Brazilian money text → amount.
//!
//! Portal markup writes money as `1.234,56` (`.` groups thousands, `,` marks
//! the decimals) and frequently glues it to quantity or unit metadata, e.g.
//! `Vl. Unit.:3,19 Vl. Total:9,57`. When a fragment holds several values the
//! rightmost one is the line total, so the **last** match wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Comma-decimal amount, optionally with `.` thousand groups. The trailing
/// non-digit keeps `3,199` from reading as `3,19`.
static RE_COMMA_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:\.\d{3})+|\d+),(\d{2})(?:\D|$)").unwrap());

/// Point-decimal fallback (`12.50`).
static RE_POINT_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d{2})(?:\D|$)").unwrap());

/// Parse free-form Brazilian money text. Never fails: `0.0` when nothing in
/// the text looks like an amount.
pub fn to_amount(text: &str) -> f64 {
    if let Some(caps) = RE_COMMA_DECIMAL.captures_iter(text).last() {
        let integer = caps[1].replace('.', "");
        return format!("{}.{}", integer, &caps[2]).parse().unwrap_or(0.0);
    }
    if let Some(caps) = RE_POINT_DECIMAL.captures_iter(text).last() {
        return format!("{}.{}", &caps[1], &caps[2]).parse().unwrap_or(0.0);
    }
    0.0
}

/// True when the text contains something [`to_amount`] would read as money.
pub fn has_amount(text: &str) -> bool {
    RE_COMMA_DECIMAL.is_match(text) || RE_POINT_DECIMAL.is_match(text)
}

/// Format an amount the way the receipt prints it (`R$ 1.234,56`).
pub fn format_brl(amount: f64) -> String {
    let s = format!("{:.2}", amount.max(0.0));
    let (integer, decimals) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    format!("R$ {},{}", grouped, decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn thousands_and_decimal_comma() {
        assert!(approx(to_amount("1.234,56"), 1234.56));
        assert!(approx(to_amount("12.345.678,90"), 12_345_678.90));
    }

    #[test]
    fn currency_prefix() {
        assert!(approx(to_amount("R$ 12,50"), 12.50));
    }

    #[test]
    fn last_match_wins() {
        assert!(approx(to_amount("Vl. Unit.:3,19 Vl. Total:9,57"), 9.57));
    }

    #[test]
    fn no_numbers() {
        assert_eq!(to_amount("no numbers here"), 0.0);
        assert_eq!(to_amount(""), 0.0);
    }

    #[test]
    fn ungrouped_integer_part() {
        assert!(approx(to_amount("1234,56"), 1234.56));
    }

    #[test]
    fn three_decimals_are_not_money() {
        // Quantities such as 0,365 kg must not read as 0,36.
        assert_eq!(to_amount("Qtde.:0,365"), 0.0);
    }

    #[test]
    fn one_decimal_is_not_money() {
        assert_eq!(to_amount("AGUA MIN 1,5L"), 0.0);
    }

    #[test]
    fn point_decimal_fallback() {
        assert!(approx(to_amount("Total 12.50"), 12.50));
        assert!(approx(to_amount("3.19 then 9.57"), 9.57));
    }

    #[test]
    fn comma_pattern_preferred_over_point() {
        // A grouped comma amount beats a stray point-decimal earlier on.
        assert!(approx(to_amount("v2.10 total 1.000,00"), 1000.0));
    }

    #[test]
    fn glued_to_unit_text() {
        assert!(approx(to_amount("9,57UN"), 9.57));
    }

    #[test]
    fn has_amount_detects_money() {
        assert!(has_amount("Vl. Total 9,57"));
        assert!(!has_amount("Código: 12345"));
    }

    #[test]
    fn format_brl_groups_thousands() {
        assert_eq!(format_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_brl(9.5), "R$ 9,50");
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(1_000_000.0), "R$ 1.000.000,00");
    }
}
