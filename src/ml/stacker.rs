//! Stacked tagger: base ensemble probabilities feeding a meta CRF.
//!
//! The meta tagger sees its own (wide) token features plus, for every base
//! variant, one numeric attribute per tag named `<variant id>:<tag>` whose
//! value is that variant's probability for the tag. During training these
//! come from out-of-fold predictions; at inference from the average of all
//! fold models.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::lemmatizer::{Lemmatizer, LemmatizerKind};
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{Tokenizer, TokenizerKind};
use crate::artifact::ModelBundle;
use crate::bio::{bio_to_spans, bio_validate, spans_to_bio};
use crate::config::TrainingConfig;
use crate::corpus::TrainingExample;
use crate::entity::{Tag, TagRun};
use crate::error::{QuerytagError, Result};
use crate::features::{Attribute, FeatureBuilder, FeatureConfig, FeatureVariant};
use crate::lexicon::{Lexicon, LexiconBuilder};
use crate::ml::MLError;
use crate::ml::crf::Crf;
use crate::ml::ensemble::{AttributeMatrix, BaseEnsemble};
use crate::ml::models::{ModelMetadata, SequenceTagger, TagProbabilities};

/// A token with its predicted tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: Token,
    pub tag: Tag,
}

/// Append `<variant id>:<tag>` probability attributes to each token.
pub fn append_probability_attributes(
    attributes: &mut [Vec<Attribute>],
    variant: FeatureVariant,
    probabilities: &[TagProbabilities],
) -> Result<()> {
    if attributes.len() != probabilities.len() {
        return Err(MLError::integrity(format!(
            "variant {variant}: {} probability rows for {} tokens",
            probabilities.len(),
            attributes.len()
        ))
        .into());
    }

    for (attrs, probs) in attributes.iter_mut().zip(probabilities) {
        for tag in Tag::ALL {
            attrs.push(Attribute::new(
                format!("{}:{}", variant.id(), tag.as_str()),
                probs[tag.index()],
            ));
        }
    }
    Ok(())
}

/// Base-variant builders plus the meta builder, all sharing one lexicon and
/// lemmatizer.
fn feature_builders(
    lexicon: &Arc<Lexicon>,
    variants: &[FeatureVariant],
    meta_features: FeatureConfig,
    lemmatizer: LemmatizerKind,
) -> (Vec<(FeatureVariant, FeatureBuilder)>, FeatureBuilder) {
    let lemmatizer: Arc<dyn Lemmatizer> = lemmatizer.build().into();
    let base = variants
        .iter()
        .map(|&v| {
            let builder =
                FeatureBuilder::with_lemmatizer(lexicon.clone(), v.config(), lemmatizer.clone());
            (v, builder)
        })
        .collect();
    let meta = FeatureBuilder::with_lemmatizer(lexicon.clone(), meta_features, lemmatizer);
    (base, meta)
}

/// The trained two-level tagger.
pub struct StackedTagger {
    tokenizer_kind: TokenizerKind,
    tokenizer: Box<dyn Tokenizer>,
    lemmatizer_kind: LemmatizerKind,
    lexicon: Arc<Lexicon>,
    base_builders: Vec<(FeatureVariant, FeatureBuilder)>,
    meta_builder: FeatureBuilder,
    ensemble: BaseEnsemble,
    meta: Crf,
    metadata: ModelMetadata,
}

impl std::fmt::Debug for StackedTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackedTagger")
            .field("tokenizer", &self.tokenizer_kind)
            .field("lemmatizer", &self.lemmatizer_kind)
            .field("variants", &self.metadata.variants)
            .field("n_splits", &self.ensemble.n_splits())
            .field("trained_at", &self.metadata.trained_at)
            .finish()
    }
}

impl StackedTagger {
    /// Fit the base ensemble and the meta tagger on a labelled corpus.
    pub fn fit(examples: &[TrainingExample], config: &TrainingConfig) -> Result<Self> {
        config.validate()?;

        let tokenizer = config.tokenizer.build();
        let mut sentences = Vec::with_capacity(examples.len());
        let mut labels = Vec::with_capacity(examples.len());
        for example in examples {
            let tokens = tokenizer.tokenize(&example.text);
            if tokens.is_empty() {
                debug!("Skipping example without tokens: {:?}", example.text);
                continue;
            }
            labels.push(spans_to_bio(&tokens, &example.spans));
            sentences.push(tokens);
        }

        info!(
            "Fitting stacked tagger on {} sentences ({} skipped)",
            sentences.len(),
            examples.len() - sentences.len()
        );

        let lexicon = Arc::new(LexiconBuilder::from_corpus(tokenizer.as_ref(), examples));
        let (base_builders, meta_builder) = feature_builders(
            &lexicon,
            &config.base_variants,
            FeatureVariant::Wide.config(),
            config.lemmatizer,
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("querytag-train-{i}"))
            .build()
            .map_err(|e| QuerytagError::other(format!("Failed to create thread pool: {e}")))?;

        let (ensemble, meta, validation_metrics) = pool.install(|| -> Result<_> {
            let matrices: BTreeMap<FeatureVariant, AttributeMatrix> = base_builders
                .iter()
                .map(|(variant, builder)| {
                    let matrix = sentences
                        .par_iter()
                        .map(|tokens| builder.sentence_attributes(tokens))
                        .collect();
                    (*variant, matrix)
                })
                .collect();

            let (ensemble, oof) =
                BaseEnsemble::fit(&matrices, &labels, &config.selected_params(), &config.cv)?;

            let meta_x = sentences
                .par_iter()
                .enumerate()
                .map(|(i, tokens)| -> Result<Vec<Vec<Attribute>>> {
                    let mut attrs = meta_builder.sentence_attributes(tokens);
                    for (variant, _) in &base_builders {
                        let probs = oof.sentence(*variant, i).ok_or_else(|| {
                            MLError::integrity(format!("variant {variant}: sentence {i} has no OOF row"))
                        })?;
                        append_probability_attributes(&mut attrs, *variant, probs)?;
                    }
                    Ok(attrs)
                })
                .collect::<Result<Vec<_>>>()?;

            let mut meta = Crf::new(config.meta_crf.clone());
            let stats = meta.train(&meta_x, &labels)?;
            info!(
                "Meta tagger trained: {} attributes, {} ms",
                stats.attributes, stats.training_time_ms
            );

            let mut metrics = std::collections::HashMap::new();
            for (variant, _) in &base_builders {
                if let Some(acc) = oof.accuracy(*variant, &labels) {
                    info!("OOF token accuracy for variant {variant}: {acc:.4}");
                    metrics.insert(format!("oof_accuracy:{variant}"), acc);
                }
            }
            metrics.insert("meta_attributes".to_string(), stats.attributes as f64);

            Ok((ensemble, meta, metrics))
        })?;

        let mut hyperparameters = std::collections::HashMap::new();
        hyperparameters.insert("n_splits".to_string(), config.cv.n_splits as f64);
        hyperparameters.insert("seed".to_string(), config.cv.seed as f64);
        hyperparameters.insert("meta_c1".to_string(), config.meta_crf.c1);
        hyperparameters.insert("meta_c2".to_string(), config.meta_crf.c2);
        hyperparameters.insert(
            "meta_max_iterations".to_string(),
            config.meta_crf.max_iterations as f64,
        );
        for (variant, params) in config.selected_params() {
            hyperparameters.insert(format!("c1:{variant}"), params.c1);
            hyperparameters.insert(format!("c2:{variant}"), params.c2);
            hyperparameters.insert(
                format!("max_iterations:{variant}"),
                params.max_iterations as f64,
            );
        }

        let metadata = ModelMetadata {
            name: config.model_name.clone(),
            version: crate::VERSION.to_string(),
            trained_at: chrono::Utc::now(),
            training_examples: sentences.len(),
            n_splits: config.cv.n_splits,
            variants: config.base_variants.clone(),
            hyperparameters,
            validation_metrics,
        };

        Ok(StackedTagger {
            tokenizer_kind: config.tokenizer,
            tokenizer,
            lemmatizer_kind: config.lemmatizer,
            lexicon,
            base_builders,
            meta_builder,
            ensemble,
            meta,
            metadata,
        })
    }

    /// Rebuild a tagger from a loaded artifact.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        bundle.ensemble.validate()?;

        let stored: Vec<_> = bundle.ensemble.variants().collect();
        let mut expected = bundle.base_variants.clone();
        expected.sort();
        if stored != expected {
            return Err(QuerytagError::artifact(format!(
                "ensemble variants {stored:?} do not match declared variants {:?}",
                bundle.base_variants
            )));
        }
        if bundle.ensemble.n_splits() != bundle.metadata.n_splits {
            return Err(QuerytagError::artifact(format!(
                "ensemble has {} folds, metadata declares {}",
                bundle.ensemble.n_splits(),
                bundle.metadata.n_splits
            )));
        }
        if !bundle.meta.is_trained() {
            return Err(QuerytagError::artifact("meta tagger is not trained"));
        }

        let lexicon = Arc::new(bundle.lexicon);
        let (base_builders, meta_builder) = feature_builders(
            &lexicon,
            &bundle.base_variants,
            bundle.meta_features,
            bundle.lemmatizer,
        );

        Ok(StackedTagger {
            tokenizer_kind: bundle.tokenizer,
            tokenizer: bundle.tokenizer.build(),
            lemmatizer_kind: bundle.lemmatizer,
            lexicon,
            base_builders,
            meta_builder,
            ensemble: bundle.ensemble,
            meta: bundle.meta,
            metadata: bundle.metadata,
        })
    }

    /// Snapshot the persistable parts.
    pub fn to_bundle(&self) -> ModelBundle {
        ModelBundle {
            metadata: self.metadata.clone(),
            tokenizer: self.tokenizer_kind,
            lemmatizer: self.lemmatizer_kind,
            lexicon: (*self.lexicon).clone(),
            base_variants: self.base_builders.iter().map(|(v, _)| *v).collect(),
            meta_features: *self.meta_builder.config(),
            ensemble: self.ensemble.clone(),
            meta: self.meta.clone(),
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn ensemble(&self) -> &BaseEnsemble {
        &self.ensemble
    }

    pub fn meta_features(&self) -> &FeatureConfig {
        self.meta_builder.config()
    }

    /// Size of the meta tagger's attribute dictionary.
    pub fn meta_attribute_count(&self) -> usize {
        self.meta.num_attributes()
    }

    pub fn tokenizer_kind(&self) -> TokenizerKind {
        self.tokenizer_kind
    }

    pub fn lemmatizer_kind(&self) -> LemmatizerKind {
        self.lemmatizer_kind
    }

    /// Tokenize with the tokenizer the model was trained with.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenizer.tokenize(text)
    }

    /// Combined meta attributes for a tokenized sentence.
    pub fn meta_attributes(&self, tokens: &[Token]) -> Result<Vec<Vec<Attribute>>> {
        let mut attrs = self.meta_builder.sentence_attributes(tokens);
        for (variant, builder) in &self.base_builders {
            let base = builder.sentence_attributes(tokens);
            let probs = self.ensemble.averaged_marginals(*variant, &base)?;
            append_probability_attributes(&mut attrs, *variant, &probs)?;
        }
        Ok(attrs)
    }

    /// Grammar-valid tags for already tokenized text.
    pub fn tag_tokens(&self, tokens: &[Token]) -> Result<Vec<Tag>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let attrs = self.meta_attributes(tokens)?;
        let tags = self.meta.decode(&attrs)?;
        Ok(bio_validate(&tags))
    }

    /// Tokenize and tag a text.
    pub fn predict(&self, text: &str) -> Result<Vec<TaggedToken>> {
        let tokens = self.tokenize(text);
        let tags = self.tag_tokens(&tokens)?;
        Ok(tokens
            .into_iter()
            .zip(tags)
            .map(|(token, tag)| TaggedToken { token, tag })
            .collect())
    }

    /// Runs of equal flat labels, `O` runs included.
    pub fn predict_spans(&self, text: &str) -> Result<Vec<TagRun>> {
        let tokens = self.tokenize(text);
        let tags = self.tag_tokens(&tokens)?;
        Ok(bio_to_spans(&tokens, &tags))
    }

    /// [`predict_spans`](Self::predict_spans) over many texts in parallel.
    pub fn predict_batch(&self, texts: &[String]) -> Result<Vec<Vec<TagRun>>> {
        texts.par_iter().map(|t| self.predict_spans(t)).collect()
    }
}
