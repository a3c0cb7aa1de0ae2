//! Whitespace tokenizer implementation.

use super::Tokenizer;

use crate::analysis::token::Token;

/// A tokenizer that splits text on whitespace.
///
/// Tokens partition the non-whitespace content of the input: every
/// maximal run of non-whitespace characters becomes exactly one token.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut start = 0;

        for (offset, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                if !current.is_empty() {
                    let position = tokens.len();
                    tokens.push(Token::with_offsets(
                        std::mem::take(&mut current),
                        position,
                        start,
                        offset,
                    ));
                }
            } else {
                if current.is_empty() {
                    start = offset;
                }
                current.push(ch);
            }
        }

        if !current.is_empty() {
            let end = start + current.chars().count();
            let position = tokens.len();
            tokens.push(Token::with_offsets(current, position, start, end));
        }

        tokens
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_tokenizer() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens = tokenizer.tokenize("hello  world\ttest");

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[1].text, "world");
        assert_eq!(tokens[1].start_offset, 7);
        assert_eq!(tokens[2].text, "test");
        assert_eq!(tokens[2].position, 2);
    }

    #[test]
    fn test_character_offsets() {
        let tokens = WhitespaceTokenizer::new().tokenize("молоко 1л 3.5%");
        let ranges: Vec<_> = tokens.iter().map(|t| t.range()).collect();
        assert_eq!(ranges, vec![(0, 6), (7, 9), (10, 14)]);
    }

    #[test]
    fn test_blank_input() {
        assert!(WhitespaceTokenizer::new().tokenize("   \n").is_empty());
        assert!(WhitespaceTokenizer::new().tokenize("").is_empty());
    }

    #[test]
    fn test_tokenizer_name() {
        assert_eq!(WhitespaceTokenizer::new().name(), "whitespace");
    }
}
