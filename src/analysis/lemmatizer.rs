//! Lemmatization for the `lemma` token feature.
//!
//! A [`Lemmatizer`] may fail; feature extraction never propagates the
//! failure and uses the lowercase surface form instead.

use serde::{Deserialize, Serialize};

use crate::error::{QuerytagError, Result};

/// Trait for morphological normalizers.
pub trait Lemmatizer: Send + Sync {
    /// Normal form of a word.
    fn lemma(&self, word: &str) -> Result<String>;

    /// Get the name of this lemmatizer.
    fn name(&self) -> &'static str;
}

/// Suffix-stripping normalizer for Russian and English product words.
#[derive(Debug, Clone)]
pub struct SuffixLemmatizer {
    /// Inflection endings, longest first.
    suffixes: Vec<String>,
    /// Minimum number of characters left after stripping.
    min_stem: usize,
}

impl Default for SuffixLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SuffixLemmatizer {
    /// Create a lemmatizer with the built-in ending list.
    pub fn new() -> Self {
        let suffixes = [
            // Russian adjective and noun endings
            "ыми", "ими", "ого", "его", "ому", "ему", "ая", "яя", "ое", "ее", "ые", "ие", "ый",
            "ий", "ой", "ую", "юю", "ам", "ям", "ах", "ях", "ов", "ев", "ей", "ом", "ем", "ы",
            "и", "а", "я", "у", "ю", "е", // English plural and participle endings
            "ies", "es", "ing", "ed", "s",
        ];
        Self::with_suffixes(suffixes.iter().map(|s| s.to_string()).collect())
    }

    /// Create a lemmatizer with custom endings.
    pub fn with_suffixes(mut suffixes: Vec<String>) -> Self {
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        SuffixLemmatizer {
            suffixes,
            min_stem: 3,
        }
    }
}

impl Lemmatizer for SuffixLemmatizer {
    fn lemma(&self, word: &str) -> Result<String> {
        if !word.chars().any(char::is_alphabetic) {
            return Err(QuerytagError::analysis(format!(
                "no alphabetic content to lemmatize in {word:?}"
            )));
        }

        let word = word.to_lowercase();
        let len = word.chars().count();

        for suffix in &self.suffixes {
            let suffix_len = suffix.chars().count();
            if len >= suffix_len + self.min_stem && word.ends_with(suffix.as_str()) {
                return Ok(word[..word.len() - suffix.len()].to_string());
            }
        }

        Ok(word)
    }

    fn name(&self) -> &'static str {
        "suffix"
    }
}

/// Lowercases and leaves the word otherwise intact.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseLemmatizer;

impl Lemmatizer for LowercaseLemmatizer {
    fn lemma(&self, word: &str) -> Result<String> {
        Ok(word.to_lowercase())
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// Which lemmatizer a feature builder uses; persisted with the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LemmatizerKind {
    #[default]
    Suffix,
    Lowercase,
}

impl LemmatizerKind {
    pub fn build(self) -> Box<dyn Lemmatizer> {
        match self {
            LemmatizerKind::Suffix => Box::new(SuffixLemmatizer::new()),
            LemmatizerKind::Lowercase => Box::new(LowercaseLemmatizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_lemmatizer() {
        let lemmatizer = SuffixLemmatizer::new();

        assert_eq!(lemmatizer.lemma("Молока").unwrap(), "молок");
        assert_eq!(lemmatizer.lemma("сливочное").unwrap(), "сливочн");
        assert_eq!(lemmatizer.lemma("cookies").unwrap(), "cook");
        // too short to strip
        assert_eq!(lemmatizer.lemma("сок").unwrap(), "сок");
    }

    #[test]
    fn test_non_alphabetic_fails() {
        let lemmatizer = SuffixLemmatizer::new();
        assert!(lemmatizer.lemma("500").is_err());
        assert!(lemmatizer.lemma("%").is_err());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(LemmatizerKind::Suffix.build().name(), "suffix");
        let lowercase = LemmatizerKind::Lowercase.build();
        assert_eq!(lowercase.lemma("Молока").unwrap(), "молока");
        assert_eq!(serde_json::to_string(&LemmatizerKind::Lowercase).unwrap(), "\"lowercase\"");
    }
}
