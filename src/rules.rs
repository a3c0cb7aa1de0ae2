//! Regex extraction of VOLUME and PERCENT mentions.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::token::OffsetMap;
use crate::entity::{EntityLabel, Tag};
use crate::postprocess::{CandidateSource, CandidateSpan};

lazy_static! {
    /// A number and a unit, optionally separated by one space.
    static ref VOLUME_RULE: Regex =
        Regex::new(r"(?i)\b(\d+[.,]?\d*)\s?(л|ml|мл|г|кг|шт)\b").unwrap();

    /// A number and a percent sign, optionally separated by one space.
    static ref PERCENT_RULE: Regex = Regex::new(r"\b(\d+[.,]?\d*)\s?%(\b|$)").unwrap();
}

/// Rule-based candidate extractor over the shared compiled patterns.
#[derive(Clone, Copy, Debug)]
pub struct RegexRules {
    volume: &'static Regex,
    percent: &'static Regex,
}

impl Default for RegexRules {
    fn default() -> Self {
        Self::new()
    }
}

impl RegexRules {
    pub fn new() -> Self {
        RegexRules {
            volume: &VOLUME_RULE,
            percent: &PERCENT_RULE,
        }
    }

    pub fn extract_volumes(&self, text: &str) -> Vec<CandidateSpan> {
        extract(self.volume, text, EntityLabel::Volume)
    }

    pub fn extract_percents(&self, text: &str) -> Vec<CandidateSpan> {
        extract(self.percent, text, EntityLabel::Percent)
    }

    /// Volumes, then percents.
    pub fn extract_all(&self, text: &str) -> Vec<CandidateSpan> {
        let mut spans = self.extract_volumes(text);
        spans.extend(self.extract_percents(text));
        spans
    }
}

/// Each match is split on whitespace: the first piece opens the entity,
/// the others continue it.
fn extract(pattern: &Regex, text: &str, entity: EntityLabel) -> Vec<CandidateSpan> {
    let offsets = OffsetMap::new(text);
    let mut spans = Vec::new();

    for mat in pattern.find_iter(text) {
        for (i, (start, end)) in whitespace_pieces(mat.as_str()).into_iter().enumerate() {
            let tag = if i == 0 {
                Tag::Begin(entity)
            } else {
                Tag::Inside(entity)
            };
            spans.push(CandidateSpan::new(
                offsets.char_offset(mat.start() + start),
                offsets.char_offset(mat.start() + end),
                tag,
                CandidateSource::Rules,
            ));
        }
    }

    spans
}

/// Byte ranges of the non-whitespace runs of `s`.
fn whitespace_pieces(s: &str) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut start = None;
    for (i, ch) in s.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(begin)) => {
                pieces.push((begin, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(begin) = start {
        pieces.push((begin, s.len()));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(spans: &[CandidateSpan]) -> Vec<(usize, usize, Tag)> {
        spans.iter().map(|s| (s.start, s.end, s.tag)).collect()
    }

    #[test]
    fn test_volume_and_percent_character_offsets() {
        let rules = RegexRules::new();
        let spans = rules.extract_all("молоко 1л 3.5%");
        assert_eq!(
            ranges(&spans),
            vec![
                (7, 9, Tag::Begin(EntityLabel::Volume)),
                (10, 14, Tag::Begin(EntityLabel::Percent)),
            ]
        );
    }

    #[test]
    fn test_spaced_volume_splits_into_pieces() {
        let rules = RegexRules::new();
        let spans = rules.extract_volumes("сок 0,5 л яблочный");
        assert_eq!(
            ranges(&spans),
            vec![
                (4, 7, Tag::Begin(EntityLabel::Volume)),
                (8, 9, Tag::Inside(EntityLabel::Volume)),
            ]
        );
    }

    #[test]
    fn test_volume_is_case_insensitive() {
        let rules = RegexRules::new();
        assert_eq!(rules.extract_volumes("shampoo 250ML").len(), 1);
        assert!(rules.extract_volumes("iphone 15").is_empty());
    }

    #[test]
    fn test_percent_with_space() {
        let rules = RegexRules::new();
        let spans = rules.extract_percents("кефир 2,5 %");
        assert_eq!(
            ranges(&spans),
            vec![
                (6, 9, Tag::Begin(EntityLabel::Percent)),
                (10, 11, Tag::Inside(EntityLabel::Percent)),
            ]
        );
    }

    #[test]
    fn test_instances_share_compiled_patterns() {
        let first = RegexRules::new();
        let second = RegexRules::default();
        assert!(std::ptr::eq(first.volume, second.volume));
        assert!(std::ptr::eq(first.percent, &*PERCENT_RULE));
    }

    #[test]
    fn test_whitespace_pieces() {
        assert_eq!(whitespace_pieces("1 л"), vec![(0, 1), (2, 4)]);
        assert_eq!(whitespace_pieces("3.5%"), vec![(0, 4)]);
    }
}
