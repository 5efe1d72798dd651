//! Cell coercion helpers.
//!
//! Every function here is total: an absent column (`None`), a blank cell and
//! an unparseable cell all degrade to the type's missing value instead of
//! failing.

use crate::models::Measure;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// Leading decimal number, optionally signed, with an optional exponent.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
});

const STRIPPED_CHARS: [char; 3] = [',', '£', '%'];

/// Parses a currency, percentage or plain number cell.
///
/// Commas, pound signs and percent signs are removed anywhere in the text,
/// then the leading number is read, so `"£1,234.50"` is `1234.5` and
/// `"12%"` is `12`. Trailing text after the number is ignored.
pub fn to_number(raw: Option<&str>) -> Measure {
    let Some(raw) = raw else {
        return Measure::Missing;
    };

    let cleaned: String = raw.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Measure::Missing;
    }

    LEADING_NUMBER
        .find(trimmed)
        .and_then(|m| f64::from_str(m.as_str()).ok())
        .map(Measure::new)
        .unwrap_or(Measure::Missing)
}

/// As [`to_number`], truncated toward zero.
pub fn to_int(raw: Option<&str>) -> Measure {
    to_number(raw).map(f64::trunc)
}

/// Lenient flag parsing for free-text yes/no columns.
pub fn to_truthy_bool(raw: Option<&str>) -> bool {
    let value = raw.unwrap_or_default().trim().to_lowercase();
    match value.as_str() {
        "y" | "yes" | "true" | "1" | "t" => true,
        "n" | "no" | "false" | "0" | "f" => false,
        other => other.contains("yes") || other.contains("true"),
    }
}

/// Trimmed cell text, or `fallback` when nothing is left.
pub fn to_trimmed_string(raw: Option<&str>, fallback: &str) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

/// Non-blank text that nevertheless failed numeric coercion.
pub fn is_unparseable_number(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| !s.trim().is_empty()) && to_number(raw).is_missing()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_strips_currency_percent_and_commas() {
        assert_eq!(to_number(Some("£1,234.50")), Measure::Present(1234.5));
        assert_eq!(to_number(Some("12%")), Measure::Present(12.0));
        assert_eq!(to_number(Some("  1,000  ")), Measure::Present(1000.0));
        assert_eq!(to_number(Some("£ 99")), Measure::Present(99.0));
    }

    #[test]
    fn test_number_accepts_negatives_and_decimals() {
        assert_eq!(to_number(Some("-12.75")), Measure::Present(-12.75));
        assert_eq!(to_number(Some("-£3.20")), Measure::Present(-3.2));
        assert_eq!(to_number(Some(".5")), Measure::Present(0.5));
        assert_eq!(to_number(Some("0")), Measure::Present(0.0));
    }

    #[test]
    fn test_number_missing_cases() {
        assert_eq!(to_number(None), Measure::Missing);
        assert_eq!(to_number(Some("")), Measure::Missing);
        assert_eq!(to_number(Some("   ")), Measure::Missing);
        assert_eq!(to_number(Some("£")), Measure::Missing);
        assert_eq!(to_number(Some("n/a")), Measure::Missing);
        assert_eq!(to_number(Some("Infinity")), Measure::Missing);
    }

    #[test]
    fn test_number_ignores_trailing_text() {
        assert_eq!(to_number(Some("12 units")), Measure::Present(12.0));
        assert!(!is_unparseable_number(Some("12 units")));
        assert!(is_unparseable_number(Some("tbc")));
        assert!(!is_unparseable_number(Some("  ")));
        assert!(!is_unparseable_number(None));
    }

    #[test]
    fn test_int_truncates_toward_zero() {
        assert_eq!(to_int(Some("3.9")), Measure::Present(3.0));
        assert_eq!(to_int(Some("-3.9")), Measure::Present(-3.0));
        assert_eq!(to_int(Some("x")), Measure::Missing);
    }

    #[test]
    fn test_truthy_tokens() {
        for raw in ["y", "Yes", " TRUE ", "1", "t"] {
            assert!(to_truthy_bool(Some(raw)), "{raw} should be true");
        }
        for raw in ["n", "No", "false", "0", "F", "", "maybe"] {
            assert!(!to_truthy_bool(Some(raw)), "{raw} should be false");
        }
        assert!(!to_truthy_bool(None));
    }

    #[test]
    fn test_truthy_substring_fallback() {
        assert!(to_truthy_bool(Some("Yes - verified")));
        assert!(to_truthy_bool(Some("mostly true")));
        assert!(!to_truthy_bool(Some("pending review")));
    }

    #[test]
    fn test_trimmed_string_fallback() {
        assert_eq!(to_trimmed_string(Some("  Makita "), "Unknown"), "Makita");
        assert_eq!(to_trimmed_string(Some("   "), "Unknown"), "Unknown");
        assert_eq!(to_trimmed_string(None, ""), "");
    }
}
