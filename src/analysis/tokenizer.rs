//! Tokenizer implementations for text analysis.
//!
//! Two strategies are provided:
//!
//! - [`whitespace::WhitespaceTokenizer`] - every maximal run of non-whitespace
//!   characters; used to stitch BIO tags onto user-visible tokens
//! - [`regex::RegexTokenizer`] - a stricter grammar (numbers/percents, letter
//!   runs, single symbols) used for feature-rich training
//!
//! Tokenizers are stateless and deterministic; `tokenize` returns a fully
//! materialized vector that can be iterated as often as needed.
//!
//! # Examples
//!
//! ```
//! use querytag::analysis::tokenizer::Tokenizer;
//! use querytag::analysis::tokenizer::whitespace::WhitespaceTokenizer;
//!
//! let tokenizer = WhitespaceTokenizer::new();
//! let tokens = tokenizer.tokenize("молоко 1л 3.5%");
//! assert_eq!(tokens.len(), 3);
//! assert_eq!(tokens[1].start_offset, 7);
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::token::Token;

/// Trait for tokenizers that convert text into tokens.
///
/// The trait requires `Send + Sync` so one tokenizer can serve concurrent
/// callers.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into an ordered sequence of tokens.
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}

pub mod regex;
pub mod whitespace;

pub use self::regex::RegexTokenizer;
pub use self::whitespace::WhitespaceTokenizer;

/// Selects the tokenizer a tagger is trained and run with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Maximal non-whitespace runs.
    Whitespace,
    /// Digits/percent runs, letter runs and single symbols.
    #[default]
    Pattern,
}

impl TokenizerKind {
    /// Construct the tokenizer this kind names.
    pub fn build(self) -> Box<dyn Tokenizer> {
        match self {
            TokenizerKind::Whitespace => Box::new(WhitespaceTokenizer::new()),
            TokenizerKind::Pattern => Box::new(RegexTokenizer::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_builds_matching_tokenizer() {
        assert_eq!(TokenizerKind::Whitespace.build().name(), "whitespace");
        assert_eq!(TokenizerKind::Pattern.build().name(), "regex");
        assert_eq!(TokenizerKind::default(), TokenizerKind::Pattern);
    }
}
