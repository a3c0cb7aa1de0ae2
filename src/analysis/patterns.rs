//! Shared regular expressions for product-query surface forms.

use lazy_static::lazy_static;
use regex::Regex;

/// Unit words recognised after a number.
pub const UNIT_ALTERNATION: &str = "л|мл|ml|l|г|гр|кг|g|kg|шт|уп|pcs";

lazy_static! {
    /// Any Cyrillic letter.
    pub static ref CYRILLIC: Regex = Regex::new(r"[А-Яа-яЁё]").unwrap();

    /// Any Latin letter.
    pub static ref LATIN: Regex = Regex::new(r"[A-Za-z]").unwrap();

    /// A percentage anywhere in the string.
    pub static ref PERCENT_LIKE: Regex = Regex::new(r"\d+[.,]?\d*\s?%").unwrap();

    /// Trademark-like symbols.
    pub static ref TRADEMARK: Regex = Regex::new(r"[®™©]").unwrap();

    /// A number followed by a unit anywhere in the string.
    pub static ref VOLUME_LIKE: Regex =
        Regex::new(&format!(r"(?i)\d+[.,]?\d*\s?(?:{UNIT_ALTERNATION})")).unwrap();

    /// A bare unit word (whole string).
    pub static ref UNIT: Regex = Regex::new(&format!(r"^(?:{UNIT_ALTERNATION})$")).unwrap();

    /// A number glued to a unit, e.g. `500мл` (whole string).
    pub static ref NUM_UNIT_STUCK: Regex =
        Regex::new(&format!(r"^\d+(?:[.,]\d+)?(?:{UNIT_ALTERNATION})$")).unwrap();

    /// The numeric prefix of a glued number+unit form.
    pub static ref NUMERIC_PREFIX: Regex = Regex::new(r"^\d+(?:[.,]\d+)?").unwrap();
}

/// Whether the word mixes Cyrillic and Latin letters.
pub fn has_mixed_script(word: &str) -> bool {
    LATIN.is_match(word) && CYRILLIC.is_match(word)
}

/// Strip a leading number from a glued number+unit form: `500мл` → `мл`.
pub fn strip_numeric_prefix(word: &str) -> &str {
    match NUMERIC_PREFIX.find(word) {
        Some(m) => &word[m.end()..],
        None => word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_patterns() {
        assert!(UNIT.is_match("мл"));
        assert!(!UNIT.is_match("молоко"));
        assert!(NUM_UNIT_STUCK.is_match("500мл"));
        assert!(NUM_UNIT_STUCK.is_match("1,5л"));
        assert!(!NUM_UNIT_STUCK.is_match("500"));
        assert_eq!(strip_numeric_prefix("1.5кг"), "кг");
    }

    #[test]
    fn test_volume_and_percent() {
        assert!(VOLUME_LIKE.is_match("1Л"));
        assert!(VOLUME_LIKE.is_match("0.5 l"));
        assert!(PERCENT_LIKE.is_match("3.5%"));
        assert!(!PERCENT_LIKE.is_match("%"));
    }

    #[test]
    fn test_mixed_script() {
        assert!(has_mixed_script("Mil\u{043A}a"));
        assert!(!has_mixed_script("милка"));
        assert!(!has_mixed_script("milka"));
        assert!(TRADEMARK.is_match("Milka®"));
    }
}
