//! Linear-chain conditional random field backed by `crfs`, the Rust port of
//! CRFsuite.
//!
//! Training runs L-BFGS with elastic-net regularization (`c1` for L1, `c2`
//! for L2) and keeps the serialized CRFsuite model in memory, so a fitted
//! [`Crf`] travels inside the bincode artifact like any other field.
//! Viterbi decoding and per-token marginals come from the `crfs` tagger.

use std::fmt;
use std::fs;
use std::time::Instant;

use ahash::AHashSet;
use crfs::Model;
use crfs::train::{Lbfgs, LbfgsParams, Trainer};
use serde::{Deserialize, Serialize};

use crate::entity::Tag;
use crate::error::{QuerytagError, Result};
use crate::features::Attribute;
use crate::ml::MLError;
use crate::ml::models::{SequenceTagger, TagProbabilities, TrainingStats};

/// L-BFGS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrfParams {
    /// L1 regularization coefficient.
    pub c1: f64,
    /// L2 regularization coefficient.
    pub c2: f64,
    /// Upper bound on L-BFGS iterations.
    pub max_iterations: usize,
}

impl Default for CrfParams {
    fn default() -> Self {
        CrfParams {
            c1: 0.1,
            c2: 0.1,
            max_iterations: 200,
        }
    }
}

impl CrfParams {
    pub fn new(c1: f64, c2: f64, max_iterations: usize) -> Self {
        CrfParams {
            c1,
            c2,
            max_iterations,
        }
    }

    pub fn with_c1(mut self, c1: f64) -> Self {
        self.c1 = c1;
        self
    }

    pub fn with_c2(mut self, c2: f64) -> Self {
        self.c2 = c2;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Linear-chain CRF over the nine-tag set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crf {
    params: CrfParams,
    /// CRFsuite model image.
    model: Vec<u8>,
    /// Tags seen in training, in [`Tag::ALL`] order.
    labels: Vec<Tag>,
    stats: Option<TrainingStats>,
}

fn crfs_error<E: fmt::Display>(err: E) -> QuerytagError {
    MLError::Backend {
        message: err.to_string(),
    }
    .into()
}

fn to_crfs(sentence: &[Vec<Attribute>]) -> Vec<Vec<crfs::Attribute>> {
    sentence
        .iter()
        .map(|attrs| {
            attrs
                .iter()
                .map(|a| crfs::Attribute::new(a.name.as_str(), a.value))
                .collect()
        })
        .collect()
}

impl Crf {
    pub fn new(params: CrfParams) -> Self {
        Crf {
            params,
            model: Vec::new(),
            labels: Vec::new(),
            stats: None,
        }
    }

    pub fn params(&self) -> &CrfParams {
        &self.params
    }

    pub fn stats(&self) -> Option<&TrainingStats> {
        self.stats.as_ref()
    }

    /// Distinct attribute names seen in training.
    pub fn num_attributes(&self) -> usize {
        self.stats.as_ref().map_or(0, |s| s.attributes)
    }

    /// Tags the model can emit.
    pub fn labels(&self) -> &[Tag] {
        &self.labels
    }

    /// Size of the CRFsuite model image in bytes.
    pub fn model_size(&self) -> usize {
        self.model.len()
    }

    fn loaded_model(&self) -> Result<Model<'_>> {
        if !self.is_trained() {
            return Err(MLError::ModelNotTrained {
                message: "CRF has no fitted weights".to_string(),
            }
            .into());
        }
        Model::new(&self.model).map_err(crfs_error)
    }
}

impl SequenceTagger for Crf {
    fn train(
        &mut self,
        sentences: &[Vec<Vec<Attribute>>],
        labels: &[Vec<Tag>],
    ) -> Result<TrainingStats> {
        if sentences.len() != labels.len() {
            return Err(MLError::InvalidFeatureVector {
                message: format!(
                    "{} attribute sequences for {} label sequences",
                    sentences.len(),
                    labels.len()
                ),
            }
            .into());
        }
        for (i, (s, y)) in sentences.iter().zip(labels).enumerate() {
            if s.len() != y.len() {
                return Err(MLError::InvalidFeatureVector {
                    message: format!("sentence {i}: {} tokens but {} labels", s.len(), y.len()),
                }
                .into());
            }
        }

        let start = Instant::now();
        let algorithm = Lbfgs::new(LbfgsParams {
            c1: self.params.c1,
            c2: self.params.c2,
            max_iterations: self.params.max_iterations,
            ..LbfgsParams::default()
        });
        let mut trainer = Trainer::new(algorithm);

        let mut attributes = AHashSet::new();
        let mut seen = [false; Tag::COUNT];
        let mut count = 0;
        for (sentence, gold) in sentences.iter().zip(labels) {
            if sentence.is_empty() {
                continue;
            }
            attributes.extend(sentence.iter().flatten().map(|a| a.name.as_str()));
            gold.iter().for_each(|tag| seen[tag.index()] = true);

            let yseq: Vec<&str> = gold.iter().map(|tag| tag.as_str()).collect();
            trainer.append(&to_crfs(sentence), &yseq).map_err(crfs_error)?;
            count += 1;
        }

        if count == 0 {
            return Err(MLError::InsufficientTrainingData {
                min_samples: 1,
                actual: 0,
            }
            .into());
        }

        let file = tempfile::NamedTempFile::new()?;
        trainer.train(file.path()).map_err(crfs_error)?;
        self.model = fs::read(file.path())?;
        Model::new(&self.model).map_err(crfs_error)?;

        self.labels = Tag::ALL.into_iter().filter(|tag| seen[tag.index()]).collect();
        let stats = TrainingStats {
            training_time_ms: start.elapsed().as_millis() as u64,
            attributes: attributes.len(),
            labels: self.labels.len(),
            sentences: count,
            model_bytes: self.model.len(),
        };
        self.stats = Some(stats.clone());
        Ok(stats)
    }

    fn marginals(&self, sentence: &[Vec<Attribute>]) -> Result<Vec<TagProbabilities>> {
        let model = self.loaded_model()?;
        if sentence.is_empty() {
            return Ok(Vec::new());
        }
        let mut tagger = model.tagger().map_err(crfs_error)?;
        tagger.set(&to_crfs(sentence)).map_err(crfs_error)?;

        let mut rows = Vec::with_capacity(sentence.len());
        for t in 0..sentence.len() {
            let mut probs = [0.0; Tag::COUNT];
            for tag in &self.labels {
                probs[tag.index()] = tagger.marginal(tag.as_str(), t).map_err(crfs_error)?;
            }
            let total: f64 = probs.iter().sum();
            if total > 0.0 {
                probs.iter_mut().for_each(|p| *p /= total);
            } else {
                probs[Tag::Outside.index()] = 1.0;
            }
            rows.push(probs);
        }
        Ok(rows)
    }

    fn decode(&self, sentence: &[Vec<Attribute>]) -> Result<Vec<Tag>> {
        let model = self.loaded_model()?;
        if sentence.is_empty() {
            return Ok(Vec::new());
        }
        let mut tagger = model.tagger().map_err(crfs_error)?;
        tagger
            .tag(&to_crfs(sentence))
            .map_err(crfs_error)?
            .into_iter()
            .map(|label| {
                Tag::parse(label.as_ref()).ok_or_else(|| {
                    MLError::integrity(format!("CRF emitted unknown tag {label:?}")).into()
                })
            })
            .collect()
    }

    fn is_trained(&self) -> bool {
        self.stats.is_some() && !self.model.is_empty()
    }
}
