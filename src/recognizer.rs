//! External entity recognizers.
//!
//! An [`EntityRecognizer`] proposes BRAND/TYPE spans from outside the
//! stacked tagger, e.g. a transformer NER service behind an adapter. The
//! extractor filters its output by confidence and treats any error as "no
//! candidates".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::error::Result;
use crate::lexicon::Lexicon;

/// A span proposed by an external recognizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NerCandidate {
    /// Start character offset (inclusive).
    pub start: usize,
    /// End character offset (exclusive).
    pub end: usize,
    /// Label as reported by the recognizer, e.g. `"BRAND"`.
    pub label: String,
    pub confidence: f64,
}

impl NerCandidate {
    pub fn new<S: Into<String>>(start: usize, end: usize, label: S, confidence: f64) -> Self {
        NerCandidate {
            start,
            end,
            label: label.into(),
            confidence,
        }
    }
}

/// Trait for recognizers consulted by the extractor.
pub trait EntityRecognizer: Send + Sync {
    /// Propose entity spans for `text`.
    fn recognize(&self, text: &str) -> Result<Vec<NerCandidate>>;

    /// Get the recognizer name/identifier.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Dictionary recognizer over the brand and type sets of a [`Lexicon`].
///
/// Every whitespace token whose lowercase form is a known brand or type is
/// reported with confidence `1.0`.
#[derive(Debug, Clone)]
pub struct LexiconRecognizer {
    lexicon: Arc<Lexicon>,
    tokenizer: WhitespaceTokenizer,
}

impl LexiconRecognizer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        LexiconRecognizer {
            lexicon,
            tokenizer: WhitespaceTokenizer::new(),
        }
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<NerCandidate>> {
        Ok(self
            .tokenizer
            .tokenize(text)
            .into_iter()
            .filter_map(|token| {
                let lower = token.text.to_lowercase();
                let label = if self.lexicon.contains_brand(&lower) {
                    "BRAND"
                } else if self.lexicon.contains_type(&lower) {
                    "TYPE"
                } else {
                    return None;
                };
                Some(NerCandidate::new(token.start_offset, token.end_offset, label, 1.0))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::TokenizerKind;
    use crate::corpus::TrainingExample;
    use crate::entity::GoldSpan;
    use crate::lexicon::LexiconBuilder;

    #[test]
    fn test_lexicon_recognizer() {
        let tokenizer = TokenizerKind::Whitespace.build();
        let examples = vec![TrainingExample::new(
            "молоко простоквашино",
            vec![GoldSpan::new(0, 6, "B-TYPE"), GoldSpan::new(7, 20, "B-BRAND")],
        )];
        let lexicon = Arc::new(LexiconBuilder::from_corpus(tokenizer.as_ref(), &examples));
        let recognizer = LexiconRecognizer::new(lexicon);

        let found = recognizer.recognize("Простоквашино кефир молоко").unwrap();
        assert_eq!(
            found,
            vec![
                NerCandidate::new(0, 13, "BRAND", 1.0),
                NerCandidate::new(20, 26, "TYPE", 1.0),
            ]
        );
        assert_eq!(recognizer.name(), "lexicon");
    }
}
