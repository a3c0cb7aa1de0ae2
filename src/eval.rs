//! Tagger evaluation on a labelled corpus.
//!
//! Gold spans are projected onto the tagger's own tokens; token accuracy
//! compares tags one by one, and entity scores count exact matches of
//! `(first token, last token, entity)` chunks.

use std::collections::BTreeMap;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bio::spans_to_bio;
use crate::corpus::TrainingExample;
use crate::entity::{EntityLabel, Tag};
use crate::error::Result;
use crate::ml::stacker::StackedTagger;

/// Scores for one entity type, or for all of them pooled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Entities predicted.
    pub found: usize,
    /// Entities in the gold standard.
    pub expected: usize,
    /// Predicted entities that exactly match a gold one.
    pub correct: usize,
}

impl TypeMetrics {
    fn from_counts(found: usize, expected: usize, correct: usize) -> Self {
        let precision = ratio(correct, found);
        let recall = ratio(correct, expected);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        TypeMetrics {
            precision,
            recall,
            f1,
            found,
            expected,
            correct,
        }
    }
}

/// Evaluation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Sentences with at least one token.
    pub sentences: usize,
    pub tokens: usize,
    pub token_accuracy: f64,
    /// Micro-averaged entity scores.
    pub micro: TypeMetrics,
    /// Per-entity scores keyed by entity name.
    pub per_type: BTreeMap<String, TypeMetrics>,
}

/// Entity chunks of a tag sequence as `(first, last, entity)` token
/// indices. A chunk starts at `B-E` or at an `I-E` that does not continue
/// an `E` chunk.
pub fn entity_chunks(tags: &[Tag]) -> Vec<(usize, usize, EntityLabel)> {
    let mut chunks: Vec<(usize, usize, EntityLabel)> = Vec::new();
    let mut open = false;

    for (i, tag) in tags.iter().enumerate() {
        match *tag {
            Tag::Outside => open = false,
            Tag::Begin(entity) => {
                chunks.push((i, i, entity));
                open = true;
            }
            Tag::Inside(entity) => match chunks.last_mut() {
                Some(last) if open && last.2 == entity && last.1 + 1 == i => last.1 = i,
                _ => {
                    chunks.push((i, i, entity));
                    open = true;
                }
            },
        }
    }

    chunks
}

/// Score `tagger` against the gold spans of `examples`.
pub fn evaluate(tagger: &StackedTagger, examples: &[TrainingExample]) -> Result<EvaluationReport> {
    let pairs: Vec<(Vec<Tag>, Vec<Tag>)> = examples
        .par_iter()
        .map(|example| -> Result<(Vec<Tag>, Vec<Tag>)> {
            let tokens = tagger.tokenize(&example.text);
            let gold = spans_to_bio(&tokens, &example.spans);
            let predicted = tagger.tag_tokens(&tokens)?;
            Ok((gold, predicted))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tokens = 0usize;
    let mut hits = 0usize;
    let mut sentences = 0usize;
    let mut counts: BTreeMap<EntityLabel, (usize, usize, usize)> = BTreeMap::new();

    for (gold, predicted) in &pairs {
        if gold.is_empty() {
            continue;
        }
        sentences += 1;
        tokens += gold.len();
        hits += gold.iter().zip(predicted).filter(|(g, p)| g == p).count();

        let gold_chunks = entity_chunks(gold);
        let predicted_chunks = entity_chunks(predicted);
        for chunk in &predicted_chunks {
            let entry = counts.entry(chunk.2).or_default();
            entry.0 += 1;
            if gold_chunks.contains(chunk) {
                entry.2 += 1;
            }
        }
        for chunk in &gold_chunks {
            counts.entry(chunk.2).or_default().1 += 1;
        }
    }

    let per_type: BTreeMap<String, TypeMetrics> = counts
        .iter()
        .map(|(entity, &(found, expected, correct))| {
            (
                entity.as_str().to_string(),
                TypeMetrics::from_counts(found, expected, correct),
            )
        })
        .collect();

    let (found, expected, correct) = counts
        .values()
        .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));
    let micro = TypeMetrics::from_counts(found, expected, correct);
    let token_accuracy = ratio(hits, tokens);

    info!(
        "Evaluated {sentences} sentences: token accuracy {token_accuracy:.4}, micro F1 {:.4}",
        micro.f1
    );

    Ok(EvaluationReport {
        sentences,
        tokens,
        token_accuracy,
        micro,
        per_type,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_chunks() {
        let tags = [
            Tag::Begin(EntityLabel::Brand),
            Tag::Inside(EntityLabel::Brand),
            Tag::Outside,
            Tag::Inside(EntityLabel::Type),
            Tag::Begin(EntityLabel::Volume),
            Tag::Begin(EntityLabel::Volume),
        ];
        assert_eq!(
            entity_chunks(&tags),
            vec![
                (0, 1, EntityLabel::Brand),
                (3, 3, EntityLabel::Type),
                (4, 4, EntityLabel::Volume),
                (5, 5, EntityLabel::Volume),
            ]
        );
    }

    #[test]
    fn test_type_metrics() {
        let metrics = TypeMetrics::from_counts(4, 5, 3);
        assert!((metrics.precision - 0.75).abs() < 1e-12);
        assert!((metrics.recall - 0.6).abs() < 1e-12);
        assert!((metrics.f1 - 2.0 * 0.75 * 0.6 / 1.35).abs() < 1e-12);

        let empty = TypeMetrics::from_counts(0, 0, 0);
        assert_eq!(empty.f1, 0.0);
    }
}
