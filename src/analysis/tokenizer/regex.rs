//! Regex-based tokenizer implementation.

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{OffsetMap, Token};
use crate::error::{QuerytagError, Result};

/// Numbers with an optional decimal part and percent sign, Latin/Cyrillic
/// letter runs, or a single symbol that is neither space nor word char.
pub const DEFAULT_PATTERN: &str = r"\d+[.,]?\d*%?|[A-Za-zА-Яа-яЁё]+|[^\s\w]";

/// A regex-based tokenizer that extracts tokens matching a pattern.
///
/// Text not matched by the pattern (whitespace, and with the default
/// pattern also word characters outside the Latin/Cyrillic alphabets)
/// produces no token.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    /// The regex pattern used to extract tokens
    pattern: Arc<Regex>,
}

impl RegexTokenizer {
    /// Create a new regex tokenizer with the default query grammar.
    pub fn new() -> Result<Self> {
        Self::with_pattern(DEFAULT_PATTERN)
    }

    /// Create a new regex tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| QuerytagError::analysis(format!("Invalid regex pattern: {e}")))?;

        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
        })
    }

    /// Get the regex pattern used by this tokenizer.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for RegexTokenizer {
    fn default() -> Self {
        Self::new().expect("Default regex pattern should be valid")
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let offsets = OffsetMap::new(text);
        self.pattern
            .find_iter(text)
            .filter(|mat| !mat.as_str().is_empty())
            .enumerate()
            .map(|(position, mat)| {
                Token::with_offsets(
                    mat.as_str(),
                    position,
                    offsets.char_offset(mat.start()),
                    offsets.char_offset(mat.end()),
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_regex_tokenizer() {
        let tokenizer = RegexTokenizer::new().unwrap();
        let tokens = tokenizer.tokenize("молоко 1л 3.5%");

        assert_eq!(texts(&tokens), vec!["молоко", "1", "л", "3.5%"]);
        assert_eq!(tokens[1].range(), (7, 8));
        assert_eq!(tokens[2].range(), (8, 9));
        assert_eq!(tokens[3].range(), (10, 14));
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn test_symbols_are_single_tokens() {
        let tokens = RegexTokenizer::default().tokenize("Coca-Cola® 0,5");
        assert_eq!(texts(&tokens), vec!["Coca", "-", "Cola", "®", "0,5"]);
    }

    #[test]
    fn test_custom_pattern() {
        let tokenizer = RegexTokenizer::with_pattern(r"\S+").unwrap();
        assert_eq!(tokenizer.pattern(), r"\S+");
        assert_eq!(tokenizer.tokenize("a  b").len(), 2);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexTokenizer::with_pattern("(").is_err());
    }

    #[test]
    fn test_tokenizer_name() {
        assert_eq!(RegexTokenizer::new().unwrap().name(), "regex");
    }
}
