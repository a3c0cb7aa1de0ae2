//! Extraction pipeline: rules, the stacked tagger and an optional external
//! recognizer combined into one set of BIO-tagged spans.
//!
//! All offsets are character offsets into the input text. Candidates are
//! aligned to whitespace tokens before post-processing, so every returned
//! span covers whole whitespace tokens, except rule spans which keep their
//! match boundaries.
//!
//! An [`Extractor`] is immutable once built and is meant to be shared as
//! `Arc<Extractor>` across threads and tasks.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::analysis::token::Token;
use crate::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
use crate::bio::spans_to_bio;
use crate::config::ExtractorConfig;
use crate::entity::{EntityLabel, GoldSpan, Tag, ranges_overlap};
use crate::error::{QuerytagError, Result};
use crate::ml::stacker::{StackedTagger, TaggedToken};
use crate::postprocess::{CandidateSource, CandidateSpan, ProcessedSpan, process_spans};
use crate::recognizer::{EntityRecognizer, NerCandidate};
use crate::rules::RegexRules;

/// The loaded extraction pipeline.
pub struct Extractor {
    config: ExtractorConfig,
    tagger: StackedTagger,
    rules: RegexRules,
    recognizer: Option<Arc<dyn EntityRecognizer>>,
    tokenizer: WhitespaceTokenizer,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("tagger", &self.tagger)
            .field("recognizer", &self.recognizer.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl Extractor {
    /// Load the model named by `config.model_path`.
    pub fn load(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        let tagger = StackedTagger::load(&config.model_path)?;
        Self::new(config, tagger)
    }

    /// Build around an already trained tagger.
    pub fn new(config: ExtractorConfig, tagger: StackedTagger) -> Result<Self> {
        config.validate()?;
        info!(
            "Extractor ready (rules: {}, recognizer: {})",
            config.use_rules, config.use_recognizer
        );
        Ok(Extractor {
            config,
            tagger,
            rules: RegexRules::new(),
            recognizer: None,
            tokenizer: WhitespaceTokenizer::new(),
        })
    }

    /// Attach an external recognizer.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        info!("Attached external recognizer {:?}", recognizer.name());
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn tagger(&self) -> &StackedTagger {
        &self.tagger
    }

    /// Extract processed entity spans, ordered by start offset.
    pub fn extract(&self, text: &str) -> Result<Vec<ProcessedSpan>> {
        let tokens = self.tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        if self.config.use_rules {
            candidates.extend(self.rules.extract_all(text));
        }
        candidates.extend(self.ensemble_candidates(text, &tokens)?);
        if self.config.use_recognizer {
            candidates.extend(self.external_candidates(text, &tokens));
        }

        debug!("{} candidates for {:?}", candidates.len(), text);
        Ok(process_spans(candidates))
    }

    /// Per whitespace token tags derived from [`extract`](Self::extract).
    pub fn tag_tokens(&self, text: &str) -> Result<Vec<TaggedToken>> {
        let spans = self.extract(text)?;
        let tokens = self.tokenizer.tokenize(text);
        let tags = project_processed(&tokens, &spans);
        Ok(tokens
            .into_iter()
            .zip(tags)
            .map(|(token, tag)| TaggedToken { token, tag })
            .collect())
    }

    /// Run [`extract`](Self::extract) on the blocking thread pool.
    pub async fn extract_async(self: &Arc<Self>, text: &str) -> Result<Vec<ProcessedSpan>> {
        let extractor = Arc::clone(self);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || extractor.extract(&text))
            .await
            .map_err(|e| QuerytagError::ThreadJoinError(e.to_string()))?
    }

    fn ensemble_candidates(&self, text: &str, tokens: &[Token]) -> Result<Vec<CandidateSpan>> {
        let gold: Vec<GoldSpan> = self
            .tagger
            .predict_spans(text)?
            .into_iter()
            .filter(|run| run.entity.is_some())
            .map(|run| GoldSpan::new(run.start, run.end, run.label()))
            .collect();
        Ok(token_candidates(tokens, &gold, CandidateSource::Ensemble, 1.0))
    }

    fn external_candidates(&self, text: &str, tokens: &[Token]) -> Vec<CandidateSpan> {
        let Some(recognizer) = &self.recognizer else {
            return Vec::new();
        };

        let found = match recognizer.recognize(text) {
            Ok(found) => found,
            Err(e) => {
                warn!("Recognizer {:?} failed, ignoring its output: {e}", recognizer.name());
                return Vec::new();
            }
        };

        let min = self.config.min_ner_confidence;
        found
            .iter()
            .filter(|c| c.confidence >= min && is_brand_or_type(c))
            .flat_map(|c| {
                let gold = [GoldSpan::new(c.start, c.end, c.label.clone())];
                token_candidates(tokens, &gold, CandidateSource::External, c.confidence)
            })
            .collect()
    }
}

fn is_brand_or_type(candidate: &NerCandidate) -> bool {
    matches!(
        EntityLabel::parse_flat(&candidate.label),
        Some(EntityLabel::Brand | EntityLabel::Type)
    )
}

/// One candidate per whitespace token covered by `gold`.
fn token_candidates(
    tokens: &[Token],
    gold: &[GoldSpan],
    source: CandidateSource,
    confidence: f64,
) -> Vec<CandidateSpan> {
    tokens
        .iter()
        .zip(spans_to_bio(tokens, gold))
        .filter(|(_, tag)| !tag.is_outside())
        .map(|(token, tag)| {
            CandidateSpan::new(token.start_offset, token.end_offset, tag, source)
                .with_confidence(confidence)
        })
        .collect()
}

/// Tag each token from the first processed span it overlaps. A token keeps
/// the span's tag when it is the span's first token and continues it
/// otherwise.
fn project_processed(tokens: &[Token], spans: &[ProcessedSpan]) -> Vec<Tag> {
    let mut prev: Option<usize> = None;
    tokens
        .iter()
        .map(|token| {
            let hit = spans
                .iter()
                .position(|s| ranges_overlap(token.range(), (s.start, s.end)));
            let tag = match (hit, prev) {
                (Some(i), Some(p)) if i == p => spans[i].entity().map_or(Tag::Outside, Tag::Inside),
                (Some(i), _) => spans[i].tag,
                (None, _) => Tag::Outside,
            };
            prev = hit;
            tag
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_candidates_align_to_tokens() {
        let tokens = WhitespaceTokenizer::new().tokenize("молоко 1л 3.5%");
        let gold = [GoldSpan::new(7, 9, "VOLUME"), GoldSpan::new(10, 14, "PERCENT")];
        let candidates = token_candidates(&tokens, &gold, CandidateSource::Ensemble, 1.0);
        let tags: Vec<_> = candidates.iter().map(|c| (c.start, c.end, c.tag)).collect();
        assert_eq!(
            tags,
            vec![
                (7, 9, Tag::Begin(EntityLabel::Volume)),
                (10, 14, Tag::Begin(EntityLabel::Percent)),
            ]
        );
    }

    #[test]
    fn test_partial_overlap_covers_whole_token() {
        let tokens = WhitespaceTokenizer::new().tokenize("coca-cola zero");
        let gold = [GoldSpan::new(0, 4, "BRAND")];
        let candidates = token_candidates(&tokens, &gold, CandidateSource::External, 0.7);
        assert_eq!(candidates.len(), 1);
        assert_eq!((candidates[0].start, candidates[0].end), (0, 9));
        assert_eq!(candidates[0].confidence, 0.7);
    }

    #[test]
    fn test_project_processed() {
        let tokens = WhitespaceTokenizer::new().tokenize("кефир 1 л простоквашино");
        let spans = vec![
            ProcessedSpan { start: 6, end: 9, tag: Tag::Begin(EntityLabel::Volume) },
            ProcessedSpan { start: 10, end: 23, tag: Tag::Begin(EntityLabel::Brand) },
        ];
        assert_eq!(
            project_processed(&tokens, &spans),
            vec![
                Tag::Outside,
                Tag::Begin(EntityLabel::Volume),
                Tag::Inside(EntityLabel::Volume),
                Tag::Begin(EntityLabel::Brand),
            ]
        );
    }

    #[test]
    fn test_external_label_filter() {
        assert!(is_brand_or_type(&NerCandidate::new(0, 1, "BRAND", 0.9)));
        assert!(is_brand_or_type(&NerCandidate::new(0, 1, "B-TYPE", 0.9)));
        assert!(!is_brand_or_type(&NerCandidate::new(0, 1, "VOLUME", 0.9)));
        assert!(!is_brand_or_type(&NerCandidate::new(0, 1, "ORG", 0.9)));
    }
}
