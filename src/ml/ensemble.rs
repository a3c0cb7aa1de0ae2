//! Cross-validated base ensemble.
//!
//! For every (fold, variant) pair a CRF is trained on the other folds and
//! asked for marginals on the held-out fold, so every sentence receives
//! exactly one out-of-fold (OOF) distribution per variant from a model that
//! never saw it. All fold models are kept; inference averages them.
//!
//! Jobs are independent and run on a rayon pool; results are joined and
//! checked before anything is returned, so an integrity failure never
//! yields a partial ensemble.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::Tag;
use crate::error::{QuerytagError, Result};
use crate::features::{Attribute, FeatureVariant};
use crate::ml::MLError;
use crate::ml::crf::{Crf, CrfParams};
use crate::ml::models::{SequenceTagger, TagProbabilities};

/// Tolerance for a distribution summing to one.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Attribute matrices of a corpus: sentence → token → attributes.
pub type AttributeMatrix = Vec<Vec<Vec<Attribute>>>;

/// K-fold settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    /// Number of folds, at least 2.
    pub n_splits: usize,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        CrossValidationConfig {
            n_splits: 5,
            seed: 42,
        }
    }
}

/// Split `0..n` into `n_splits` shuffled folds.
///
/// The first `n % n_splits` folds hold one extra index. Deterministic for
/// a fixed seed.
pub fn fold_assignment(n: usize, config: &CrossValidationConfig) -> Result<Vec<Vec<usize>>> {
    let k = config.n_splits;
    if k < 2 {
        return Err(QuerytagError::config(format!("n_splits must be >= 2, got {k}")));
    }
    if n < k {
        return Err(MLError::InsufficientTrainingData {
            min_samples: k,
            actual: n,
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut offset = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        folds.push(indices[offset..offset + size].to_vec());
        offset += size;
    }

    Ok(folds)
}

/// Check that `probs` is a distribution.
pub fn is_distribution(probs: &TagProbabilities) -> bool {
    let total: f64 = probs.iter().sum();
    probs.iter().all(|p| p.is_finite() && *p >= 0.0) && (total - 1.0).abs() <= DISTRIBUTION_TOLERANCE
}

/// Out-of-fold distributions: variant → sentence → token.
#[derive(Debug, Clone, Default)]
pub struct OofPredictions {
    per_variant: BTreeMap<FeatureVariant, Vec<Vec<TagProbabilities>>>,
}

impl OofPredictions {
    pub fn get(&self, variant: FeatureVariant) -> Option<&[Vec<TagProbabilities>]> {
        self.per_variant.get(&variant).map(Vec::as_slice)
    }

    pub fn sentence(&self, variant: FeatureVariant, index: usize) -> Option<&[TagProbabilities]> {
        self.per_variant
            .get(&variant)
            .and_then(|rows| rows.get(index))
            .map(Vec::as_slice)
    }

    /// Fraction of tokens whose argmax matches the gold tag.
    pub fn accuracy(&self, variant: FeatureVariant, labels: &[Vec<Tag>]) -> Option<f64> {
        let rows = self.per_variant.get(&variant)?;
        let (mut hits, mut total) = (0usize, 0usize);
        for (sentence, gold) in rows.iter().zip(labels) {
            for (probs, tag) in sentence.iter().zip(gold) {
                total += 1;
                if crate::ml::models::argmax(probs) == tag.index() {
                    hits += 1;
                }
            }
        }
        (total > 0).then(|| hits as f64 / total as f64)
    }
}

/// One output of a fold job.
struct FoldResult {
    variant: FeatureVariant,
    fold: usize,
    model: Crf,
    held_out: Vec<(usize, Vec<TagProbabilities>)>,
}

/// Fold models per variant, each list of one fixed length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEnsemble {
    n_splits: usize,
    models: BTreeMap<FeatureVariant, Vec<Crf>>,
}

impl BaseEnsemble {
    /// Train every (fold, variant) pair and collect OOF distributions.
    ///
    /// `matrices` holds one attribute matrix per variant, all over the same
    /// sentences as `labels`.
    pub fn fit(
        matrices: &BTreeMap<FeatureVariant, AttributeMatrix>,
        labels: &[Vec<Tag>],
        params: &BTreeMap<FeatureVariant, CrfParams>,
        cv: &CrossValidationConfig,
    ) -> Result<(BaseEnsemble, OofPredictions)> {
        let n = labels.len();
        for (variant, matrix) in matrices {
            if matrix.len() != n {
                return Err(MLError::integrity(format!(
                    "variant {variant}: {} attribute sequences for {n} sentences",
                    matrix.len()
                ))
                .into());
            }
        }

        let folds = fold_assignment(n, cv)?;
        let mut jobs = Vec::with_capacity(folds.len() * matrices.len());
        for fold in 0..folds.len() {
            for &variant in matrices.keys() {
                let crf_params = params.get(&variant).cloned().ok_or_else(|| {
                    QuerytagError::config(format!("no CRF parameters for variant {variant}"))
                })?;
                jobs.push((fold, variant, crf_params));
            }
        }

        info!(
            "Training {} fold models ({} folds x {} variants) on {n} sentences",
            jobs.len(),
            folds.len(),
            matrices.len()
        );

        let results: Vec<FoldResult> = jobs
            .into_par_iter()
            .map(|(fold, variant, crf_params)| -> Result<FoldResult> {
                let matrix = &matrices[&variant];
                let held_out = &folds[fold];
                let train_idx: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(f, _)| *f != fold)
                    .flat_map(|(_, idx)| idx.iter().copied())
                    .collect();

                let xs: Vec<_> = train_idx.iter().map(|&i| matrix[i].clone()).collect();
                let ys: Vec<_> = train_idx.iter().map(|&i| labels[i].clone()).collect();

                let mut model = Crf::new(crf_params);
                let stats = model.train(&xs, &ys)?;
                debug!(
                    "Fold {}/{} variant {variant}: {} attributes, {} ms",
                    fold + 1,
                    folds.len(),
                    stats.attributes,
                    stats.training_time_ms
                );

                let held_out = held_out
                    .iter()
                    .map(|&i| model.marginals(&matrix[i]).map(|probs| (i, probs)))
                    .collect::<Result<Vec<_>>>()?;

                Ok(FoldResult {
                    variant,
                    fold,
                    model,
                    held_out,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::assemble(results, matrices, folds.len(), n)
    }

    /// Join fold results, enforcing OOF coverage and shape.
    fn assemble(
        mut results: Vec<FoldResult>,
        matrices: &BTreeMap<FeatureVariant, AttributeMatrix>,
        n_splits: usize,
        n: usize,
    ) -> Result<(BaseEnsemble, OofPredictions)> {
        results.sort_by_key(|r| (r.variant, r.fold));

        let mut models: BTreeMap<FeatureVariant, Vec<Crf>> = BTreeMap::new();
        let mut slots: BTreeMap<FeatureVariant, Vec<Option<Vec<TagProbabilities>>>> =
            matrices.keys().map(|&v| (v, vec![None; n])).collect();

        for result in results {
            let rows = slots
                .get_mut(&result.variant)
                .ok_or_else(|| MLError::integrity(format!("unexpected variant {}", result.variant)))?;
            for (i, probs) in result.held_out {
                if rows[i].replace(probs).is_some() {
                    return Err(MLError::integrity(format!(
                        "variant {}: sentence {i} received more than one OOF distribution",
                        result.variant
                    ))
                    .into());
                }
            }
            models.entry(result.variant).or_default().push(result.model);
        }

        let mut per_variant = BTreeMap::new();
        for (variant, rows) in slots {
            let matrix = &matrices[&variant];
            let mut filled = Vec::with_capacity(n);
            for (i, row) in rows.into_iter().enumerate() {
                let row = row.ok_or_else(|| {
                    MLError::integrity(format!("variant {variant}: sentence {i} has no OOF distribution"))
                })?;
                if row.len() != matrix[i].len() {
                    return Err(MLError::integrity(format!(
                        "variant {variant}: sentence {i} has {} OOF rows for {} tokens",
                        row.len(),
                        matrix[i].len()
                    ))
                    .into());
                }
                if let Some(t) = row.iter().position(|p| !is_distribution(p)) {
                    return Err(MLError::integrity(format!(
                        "variant {variant}: sentence {i} token {t} is not a distribution"
                    ))
                    .into());
                }
                filled.push(row);
            }
            per_variant.insert(variant, filled);
        }

        let ensemble = BaseEnsemble { n_splits, models };
        ensemble.validate()?;
        Ok((ensemble, OofPredictions { per_variant }))
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn variants(&self) -> impl Iterator<Item = FeatureVariant> + '_ {
        self.models.keys().copied()
    }

    pub fn models(&self, variant: FeatureVariant) -> Option<&[Crf]> {
        self.models.get(&variant).map(Vec::as_slice)
    }

    /// Every variant must hold exactly `n_splits` trained models.
    pub fn validate(&self) -> Result<()> {
        if self.n_splits < 2 {
            return Err(MLError::integrity(format!("fold count {} is below 2", self.n_splits)).into());
        }
        if self.models.is_empty() {
            return Err(MLError::integrity("ensemble holds no variants").into());
        }
        for (variant, models) in &self.models {
            if models.len() != self.n_splits {
                return Err(MLError::integrity(format!(
                    "variant {variant}: {} fold models, expected {}",
                    models.len(),
                    self.n_splits
                ))
                .into());
            }
            if !models.iter().all(Crf::is_trained) {
                return Err(MLError::integrity(format!("variant {variant}: untrained fold model")).into());
            }
        }
        Ok(())
    }

    /// Arithmetic mean of all fold models' marginals, renormalized.
    pub fn averaged_marginals(
        &self,
        variant: FeatureVariant,
        sentence: &[Vec<Attribute>],
    ) -> Result<Vec<TagProbabilities>> {
        let models = self.models.get(&variant).ok_or_else(|| MLError::ModelNotTrained {
            message: format!("no fold models for variant {variant}"),
        })?;

        let mut acc = vec![[0.0; Tag::COUNT]; sentence.len()];
        for model in models {
            for (row, probs) in acc.iter_mut().zip(model.marginals(sentence)?) {
                for (a, p) in row.iter_mut().zip(probs) {
                    *a += p;
                }
            }
        }

        for row in &mut acc {
            let total: f64 = row.iter().sum();
            if total > 0.0 {
                row.iter_mut().for_each(|p| *p /= total);
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityLabel;

    #[test]
    fn test_fold_assignment_sizes() {
        let cv = CrossValidationConfig::default();
        let folds = fold_assignment(12, &cv).unwrap();
        let sizes: Vec<_> = folds.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);

        let mut all: Vec<_> = folds.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_fold_assignment_deterministic() {
        let cv = CrossValidationConfig { n_splits: 3, seed: 7 };
        assert_eq!(fold_assignment(20, &cv).unwrap(), fold_assignment(20, &cv).unwrap());
        let other = CrossValidationConfig { n_splits: 3, seed: 8 };
        assert_ne!(fold_assignment(20, &cv).unwrap(), fold_assignment(20, &other).unwrap());
    }

    #[test]
    fn test_fold_assignment_rejects_bad_input() {
        let cv = CrossValidationConfig { n_splits: 1, seed: 0 };
        assert!(matches!(fold_assignment(10, &cv), Err(QuerytagError::Config(_))));
        let cv = CrossValidationConfig { n_splits: 5, seed: 0 };
        assert!(matches!(
            fold_assignment(4, &cv),
            Err(QuerytagError::Ml(MLError::InsufficientTrainingData { min_samples: 5, actual: 4 }))
        ));
    }

    fn toy_matrices() -> (BTreeMap<FeatureVariant, AttributeMatrix>, Vec<Vec<Tag>>) {
        let brand = Tag::Begin(EntityLabel::Brand);
        let ty = Tag::Begin(EntityLabel::Type);
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..9 {
            let word = format!("w=brand{}", i % 3);
            xs.push(vec![
                vec![Attribute::new(word, 1.0), Attribute::new("bias", 1.0)],
                vec![Attribute::new("w=milk", 1.0), Attribute::new("bias", 1.0)],
            ]);
            ys.push(vec![brand, ty]);
        }
        let matrices = [FeatureVariant::Minimal, FeatureVariant::Lexicon]
            .into_iter()
            .map(|v| (v, xs.clone()))
            .collect();
        (matrices, ys)
    }

    fn toy_params() -> BTreeMap<FeatureVariant, CrfParams> {
        [FeatureVariant::Minimal, FeatureVariant::Lexicon]
            .into_iter()
            .map(|v| (v, CrfParams::default().with_max_iterations(30)))
            .collect()
    }

    #[test]
    fn test_fit_covers_every_sentence() {
        let (matrices, ys) = toy_matrices();
        let cv = CrossValidationConfig { n_splits: 3, seed: 42 };
        let (ensemble, oof) = BaseEnsemble::fit(&matrices, &ys, &toy_params(), &cv).unwrap();

        assert_eq!(ensemble.n_splits(), 3);
        for variant in [FeatureVariant::Minimal, FeatureVariant::Lexicon] {
            assert_eq!(ensemble.models(variant).unwrap().len(), 3);
            let rows = oof.get(variant).unwrap();
            assert_eq!(rows.len(), 9);
            for row in rows {
                assert_eq!(row.len(), 2);
                assert!(row.iter().all(is_distribution));
            }
        }

        let avg = ensemble
            .averaged_marginals(FeatureVariant::Minimal, &matrices[&FeatureVariant::Minimal][0])
            .unwrap();
        assert_eq!(avg.len(), 2);
        assert!(avg.iter().all(is_distribution));
    }

    #[test]
    fn test_fit_rejects_misaligned_matrices() {
        let (mut matrices, ys) = toy_matrices();
        matrices.get_mut(&FeatureVariant::Lexicon).unwrap().pop();
        let cv = CrossValidationConfig { n_splits: 3, seed: 42 };
        let err = BaseEnsemble::fit(&matrices, &ys, &toy_params(), &cv).unwrap_err();
        assert!(matches!(err, QuerytagError::Ml(MLError::DataIntegrity { .. })));
    }

    #[test]
    fn test_validate_detects_missing_fold() {
        let (matrices, ys) = toy_matrices();
        let cv = CrossValidationConfig { n_splits: 3, seed: 42 };
        let (mut ensemble, _) = BaseEnsemble::fit(&matrices, &ys, &toy_params(), &cv).unwrap();
        ensemble
            .models
            .get_mut(&FeatureVariant::Minimal)
            .unwrap()
            .pop();
        assert!(ensemble.validate().is_err());
    }

    #[test]
    fn test_is_distribution() {
        let mut probs = [0.0; Tag::COUNT];
        probs[0] = 0.5;
        probs[1] = 0.5;
        assert!(is_distribution(&probs));
        probs[2] = 0.1;
        assert!(!is_distribution(&probs));
    }
}
