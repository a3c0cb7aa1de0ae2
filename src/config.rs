//! Training and extraction configuration.
//!
//! Both configurations are plain serde structs. Missing fields in a JSON
//! file fall back to their defaults:
//!
//! ```
//! use querytag::config::TrainingConfig;
//!
//! let config: TrainingConfig = serde_json::from_str(r#"{"cv": {"n_splits": 3, "seed": 1}}"#).unwrap();
//! assert_eq!(config.cv.n_splits, 3);
//! assert_eq!(config.base_variants.len(), 3);
//! assert!(config.validate().is_ok());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::lemmatizer::LemmatizerKind;
use crate::analysis::tokenizer::TokenizerKind;
use crate::error::{QuerytagError, Result};
use crate::features::FeatureVariant;
use crate::ml::crf::CrfParams;
use crate::ml::ensemble::CrossValidationConfig;

/// Settings for fitting a stacked tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Name recorded in the model metadata.
    pub model_name: String,
    /// Fold count and shuffle seed.
    pub cv: CrossValidationConfig,
    /// Tokenizer used for training and, through the artifact, inference.
    pub tokenizer: TokenizerKind,
    /// Lemmatizer behind the `lemma` feature; stored in the artifact.
    pub lemmatizer: LemmatizerKind,
    /// Base feature variants, in order.
    pub base_variants: Vec<FeatureVariant>,
    /// Optimizer settings per base variant.
    pub base_crf: BTreeMap<FeatureVariant, CrfParams>,
    /// Optimizer settings for the meta tagger.
    pub meta_crf: CrfParams,
    /// Worker threads for fold training.
    pub threads: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let base_crf = FeatureVariant::ALL
            .into_iter()
            .map(|variant| {
                let (c1, c2) = match variant {
                    FeatureVariant::Minimal => (0.05, 0.1),
                    FeatureVariant::Lexicon => (0.1, 0.1),
                    FeatureVariant::Wide | FeatureVariant::ExtraWide => (0.1, 0.2),
                };
                (variant, CrfParams::new(c1, c2, 200))
            })
            .collect();

        TrainingConfig {
            model_name: "querytag".to_string(),
            cv: CrossValidationConfig::default(),
            tokenizer: TokenizerKind::default(),
            lemmatizer: LemmatizerKind::default(),
            base_variants: FeatureVariant::DEFAULT_BASE.to_vec(),
            base_crf,
            meta_crf: CrfParams::new(0.05, 0.2, 300),
            threads: num_cpus::get(),
        }
    }
}

impl TrainingConfig {
    /// Read a JSON configuration file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            QuerytagError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: TrainingConfig = serde_json::from_str(&raw)
            .map_err(|e| QuerytagError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cv.n_splits < 2 {
            return Err(QuerytagError::config(format!(
                "cv.n_splits must be >= 2, got {}",
                self.cv.n_splits
            )));
        }
        if self.base_variants.is_empty() {
            return Err(QuerytagError::config("base_variants must not be empty"));
        }
        let unique: BTreeSet<_> = self.base_variants.iter().collect();
        if unique.len() != self.base_variants.len() {
            return Err(QuerytagError::config("base_variants contains duplicates"));
        }
        for variant in &self.base_variants {
            let params = self.base_crf.get(variant).ok_or_else(|| {
                QuerytagError::config(format!("base_crf has no entry for variant {variant}"))
            })?;
            validate_params(&format!("base_crf.{variant}"), params)?;
        }
        validate_params("meta_crf", &self.meta_crf)?;
        if self.threads == 0 {
            return Err(QuerytagError::config("threads must be positive"));
        }
        Ok(())
    }

    /// Parameters of the selected base variants only.
    pub fn selected_params(&self) -> BTreeMap<FeatureVariant, CrfParams> {
        self.base_variants
            .iter()
            .filter_map(|v| self.base_crf.get(v).map(|p| (*v, p.clone())))
            .collect()
    }
}

fn validate_params(name: &str, params: &CrfParams) -> Result<()> {
    if params.max_iterations == 0 {
        return Err(QuerytagError::config(format!("{name}.max_iterations must be positive")));
    }
    for (field, value) in [("c1", params.c1), ("c2", params.c2)] {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(QuerytagError::config(format!(
                "{name}.{field} must be non-negative, got {value}"
            )));
        }
    }
    Ok(())
}

/// Settings for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Model artifact to load.
    pub model_path: PathBuf,
    /// Minimum confidence for external recognizer candidates.
    pub min_ner_confidence: f64,
    /// Add regex VOLUME/PERCENT candidates.
    pub use_rules: bool,
    /// Consult the external recognizer when one is attached.
    pub use_recognizer: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            model_path: PathBuf::from("models/querytag.bin"),
            min_ner_confidence: 0.4,
            use_rules: true,
            use_recognizer: true,
        }
    }
}

impl ExtractorConfig {
    pub fn with_model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_ner_confidence) {
            return Err(QuerytagError::config(format!(
                "min_ner_confidence must be within [0, 1], got {}",
                self.min_ner_confidence
            )));
        }
        Ok(())
    }
}
