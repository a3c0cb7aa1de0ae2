//! Tagger trait and training bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::Tag;
use crate::error::Result;
use crate::features::{Attribute, FeatureVariant};

/// One probability per tag, indexed by [`Tag::index`].
pub type TagProbabilities = [f64; Tag::COUNT];

/// Trait for sequence taggers over attribute sequences.
pub trait SequenceTagger: Send + Sync {
    /// Fit the model on sentences of per-token attributes and gold tags.
    fn train(&mut self, sentences: &[Vec<Vec<Attribute>>], labels: &[Vec<Tag>])
    -> Result<TrainingStats>;

    /// Per-token marginal tag distributions.
    fn marginals(&self, sentence: &[Vec<Attribute>]) -> Result<Vec<TagProbabilities>>;

    /// Most likely tag sequence.
    fn decode(&self, sentence: &[Vec<Attribute>]) -> Result<Vec<Tag>>;

    /// Check if the model is trained and ready for predictions.
    fn is_trained(&self) -> bool;
}

/// Training statistics for one tagger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Training time in milliseconds.
    pub training_time_ms: u64,
    /// Distinct attribute names in the training data.
    pub attributes: usize,
    /// Distinct tags in the training data.
    pub labels: usize,
    /// Number of non-empty training sentences.
    pub sentences: usize,
    /// Size of the serialized model.
    pub model_bytes: usize,
}

/// Model metadata for tracking model information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name/identifier.
    pub name: String,
    /// Crate version that trained the model.
    pub version: String,
    /// Training timestamp.
    pub trained_at: chrono::DateTime<chrono::Utc>,
    /// Number of training sentences used.
    pub training_examples: usize,
    /// Cross-validation fold count.
    pub n_splits: usize,
    /// Base feature variants, in training order.
    pub variants: Vec<FeatureVariant>,
    /// Model hyperparameters.
    pub hyperparameters: HashMap<String, f64>,
    /// Out-of-fold metrics, e.g. `oof_accuracy:A`.
    pub validation_metrics: HashMap<String, f64>,
}

/// Index of the largest probability.
pub fn argmax(probs: &TagProbabilities) -> usize {
    probs
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
            if p > best.1 { (i, p) } else { best }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_first_maximum() {
        let mut probs = [0.0; Tag::COUNT];
        probs[3] = 0.4;
        probs[5] = 0.4;
        probs[1] = 0.2;
        assert_eq!(argmax(&probs), 3);
    }
}
