use std::collections::HashMap;

use once_cell::sync::Lazy;

/// ISO 4217 code → display symbol. Codes missing here use the code itself.
static SYMBOLS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("USD", "$"),
        ("EUR", "€"),
        ("GBP", "£"),
        ("JPY", "¥"),
        ("CNY", "¥"),
        ("INR", "₹"),
        ("KRW", "₩"),
        ("RUB", "₽"),
        ("TRY", "₺"),
        ("ILS", "₪"),
        ("NGN", "₦"),
        ("VND", "₫"),
        ("PHP", "₱"),
        ("UAH", "₴"),
        ("BRL", "R$"),
        ("CAD", "C$"),
        ("AUD", "A$"),
        ("NZD", "NZ$"),
        ("HKD", "HK$"),
        ("SGD", "S$"),
        ("MXN", "MX$"),
        ("CHF", "CHF"),
        ("ZAR", "R"),
        ("SEK", "kr"),
        ("NOK", "kr"),
        ("DKK", "kr"),
        ("PLN", "zł"),
    ])
});

pub fn symbol_for(code: &str) -> &str {
    let code = code.trim();
    SYMBOLS
        .get(code.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(code)
}

/// Amount pattern: optional symbol, optional whitespace, digits, optional
/// 1–2 digit decimals. The symbol is regex-escaped (`$` → `\$`).
pub fn currency_pattern(code: Option<&str>) -> String {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!(r"^(?:{})?\s*\d+(?:\.\d{{1,2}})?$", regex::escape(symbol_for(c))),
        None => r"^\d+(?:\.\d{1,2})?$".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn mapped_and_unmapped_codes() {
        assert_eq!(symbol_for("usd"), "$");
        assert_eq!(symbol_for("EUR"), "€");
        assert_eq!(symbol_for("XYZ"), "XYZ");
    }

    #[test]
    fn metacharacter_symbols_are_escaped() {
        assert_eq!(currency_pattern(Some("USD")), r"^(?:\$)?\s*\d+(?:\.\d{1,2})?$");
        assert_eq!(currency_pattern(Some("BRL")), r"^(?:R\$)?\s*\d+(?:\.\d{1,2})?$");
    }

    #[test]
    fn pattern_accepts_amounts_with_or_without_symbol() {
        let rx = Regex::new(&currency_pattern(Some("USD"))).unwrap();
        for ok in ["12", "$12", "$ 12.5", "12.50"] {
            assert!(rx.is_match(ok), "{ok} should match");
        }
        for bad in ["12.505", "€12", "$", "twelve"] {
            assert!(!rx.is_match(bad), "{bad} should not match");
        }

        let rx = Regex::new(&currency_pattern(None)).unwrap();
        assert!(rx.is_match("3.99"));
        assert!(!rx.is_match("$3.99"));
    }
}
