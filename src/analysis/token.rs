//! Token types and offset utilities for text analysis.
//!
//! A [`Token`] records its text together with half-open *character*
//! offsets (Unicode scalar values, not bytes) into the original string, so
//! spans produced downstream can be handed back to callers that index text
//! by character.
//!
//! # Examples
//!
//! ```
//! use querytag::analysis::token::Token;
//!
//! let token = Token::with_offsets("1л", 1, 7, 9);
//! assert_eq!(token.text, "1л");
//! assert_eq!(token.start_offset, 7);
//! assert_eq!(token.end_offset, 9);
//! assert_eq!(token.char_len(), 2);
//! ```

use serde::{Deserialize, Serialize};

/// A token: one unit of text with its position and character offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// The position of the token in the token sequence (0-based)
    pub position: usize,

    /// Character offset where this token starts in the original text
    pub start_offset: usize,

    /// Character offset where this token ends in the original text (exclusive)
    pub end_offset: usize,
}

impl Token {
    /// Create a new token with text, position, and character offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Number of characters covered by the token.
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Check if the token is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The `(start, end)` character range of the token.
    pub fn range(&self) -> (usize, usize) {
        (self.start_offset, self.end_offset)
    }
}

/// Converts byte offsets reported by the regex engine into character
/// offsets.
#[derive(Debug, Clone)]
pub struct OffsetMap {
    byte_starts: Vec<usize>,
}

impl OffsetMap {
    pub fn new(text: &str) -> Self {
        OffsetMap {
            byte_starts: text.char_indices().map(|(b, _)| b).collect(),
        }
    }

    /// Character offset of the char starting at (or the end position
    /// following) `byte`.
    pub fn char_offset(&self, byte: usize) -> usize {
        self.byte_starts.partition_point(|&b| b < byte)
    }
}

/// Slice `text` by character offsets, clamping to the text length.
pub fn slice_chars(text: &str, start: usize, end: usize) -> &str {
    let mut indices = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len()));
    let begin = indices.clone().nth(start).unwrap_or(text.len());
    let finish = indices.nth(end).unwrap_or(text.len());
    if begin >= finish {
        ""
    } else {
        &text[begin..finish]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_map_cyrillic() {
        let text = "молоко 1л";
        let map = OffsetMap::new(text);
        // "молоко" is 12 bytes, 6 chars
        assert_eq!(map.char_offset(0), 0);
        assert_eq!(map.char_offset(12), 6);
        assert_eq!(map.char_offset(13), 7);
        assert_eq!(map.char_offset(text.len()), 9);
    }

    #[test]
    fn test_slice_chars() {
        let text = "молоко 1л 3.5%";
        assert_eq!(slice_chars(text, 7, 9), "1л");
        assert_eq!(slice_chars(text, 10, 14), "3.5%");
        assert_eq!(slice_chars(text, 10, 40), "3.5%");
        assert_eq!(slice_chars(text, 20, 30), "");
    }
}
