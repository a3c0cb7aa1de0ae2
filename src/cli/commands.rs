//! Command implementations for the querytag CLI.

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::analysis::token::slice_chars;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{ExtractorConfig, TrainingConfig};
use crate::corpus::{CorpusOptions, TrainingExample, load_corpus};
use crate::error::{QuerytagError, Result};
use crate::eval::evaluate;
use crate::lexicon::Lexicon;
use crate::ml::stacker::StackedTagger;
use crate::pipeline::Extractor;
use crate::recognizer::LexiconRecognizer;

/// Execute a CLI command.
pub fn execute_command(args: QuerytagArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train_model(train_args, &args),
        Command::Predict(predict_args) => predict(predict_args, &args),
        Command::Evaluate(evaluate_args) => evaluate_model(evaluate_args, &args),
        Command::Inspect(inspect_args) => inspect_model(inspect_args, &args),
    }
}

fn read_corpus(args: &CorpusArgs) -> Result<Vec<TrainingExample>> {
    let options = CorpusOptions {
        delimiter: args.delimiter,
        text_column: args.text_column.clone(),
        spans_column: args.spans_column.clone(),
    };
    let examples = load_corpus(&args.data, &options)?;
    if examples.is_empty() {
        return Err(QuerytagError::corpus(format!(
            "no examples in {}",
            args.data.display()
        )));
    }
    info!("Read {} examples from {}", examples.len(), args.data.display());
    Ok(examples)
}

fn lexicon_sizes(lexicon: &Lexicon) -> LexiconSizes {
    let (brands, types, units) = lexicon.sizes();
    LexiconSizes {
        brands,
        types,
        units,
    }
}

/// Train and save a model.
fn train_model(args: &TrainArgs, cli_args: &QuerytagArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(folds) = args.folds {
        config.cv.n_splits = folds;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let examples = read_corpus(&args.corpus)?;

    let start_time = Instant::now();
    let tagger = StackedTagger::fit(&examples, &config)?;
    tagger.save(&args.output)?;
    let duration = start_time.elapsed();

    let metadata = tagger.metadata();
    output_result(
        "Model trained successfully",
        &TrainingResult {
            model_path: args.output.to_string_lossy().to_string(),
            examples: examples.len(),
            sentences: metadata.training_examples,
            n_splits: metadata.n_splits,
            variants: metadata.variants.iter().map(|v| v.to_string()).collect(),
            lexicon: lexicon_sizes(tagger.lexicon()),
            duration_ms: duration.as_millis() as u64,
            validation_metrics: metadata
                .validation_metrics
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect::<BTreeMap<_, _>>(),
        },
        cli_args,
    )
}

/// Tag queries with a saved model.
fn predict(args: &PredictArgs, cli_args: &QuerytagArgs) -> Result<()> {
    let config = ExtractorConfig {
        model_path: args.model.clone(),
        min_ner_confidence: args.min_confidence,
        use_rules: !args.no_rules,
        use_recognizer: args.gazetteer,
    };

    let mut extractor = Extractor::load(config)?;
    if args.gazetteer {
        let lexicon = Arc::new(extractor.tagger().lexicon().clone());
        extractor = extractor.with_recognizer(Arc::new(LexiconRecognizer::new(lexicon)));
    }

    let start_time = Instant::now();
    let mut predictions = Vec::with_capacity(args.texts.len());
    for text in &args.texts {
        let prediction = if args.tokens {
            let tokens = extractor
                .tag_tokens(text)?
                .into_iter()
                .map(|tagged| TokenOutput {
                    start: tagged.token.start_offset,
                    end: tagged.token.end_offset,
                    token: tagged.token.text,
                    tag: tagged.tag.to_string(),
                })
                .collect();
            Prediction {
                text: text.clone(),
                spans: None,
                tokens: Some(tokens),
            }
        } else {
            let spans = extractor
                .extract(text)?
                .into_iter()
                .map(|span| SpanOutput {
                    start: span.start,
                    end: span.end,
                    tag: span.tag.to_string(),
                    text: slice_chars(text, span.start, span.end).to_string(),
                })
                .collect();
            Prediction {
                text: text.clone(),
                spans: Some(spans),
                tokens: None,
            }
        };
        predictions.push(prediction);
    }

    output_result(
        "Predictions",
        &PredictionResults {
            predictions,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Score a saved model on a labelled corpus.
fn evaluate_model(args: &EvaluateArgs, cli_args: &QuerytagArgs) -> Result<()> {
    let tagger = StackedTagger::load(&args.model)?;
    let examples = read_corpus(&args.corpus)?;
    let report = evaluate(&tagger, &examples)?;
    output_result("Evaluation", &report, cli_args)
}

/// Show what a model artifact contains.
fn inspect_model(args: &InspectArgs, cli_args: &QuerytagArgs) -> Result<()> {
    let file_size_bytes = fs::metadata(&args.model)
        .map_err(|e| QuerytagError::artifact(format!("cannot stat {}: {e}", args.model.display())))?
        .len();
    let tagger = StackedTagger::load(&args.model)?;

    let tokenizer = serde_json::to_value(tagger.tokenizer_kind())?
        .as_str()
        .unwrap_or_default()
        .to_string();

    output_result(
        "Model information",
        &ModelInfo {
            path: args.model.to_string_lossy().to_string(),
            file_size_bytes,
            tokenizer,
            lexicon: lexicon_sizes(tagger.lexicon()),
            meta_attributes: tagger.meta_attribute_count(),
            metadata: tagger.metadata().clone(),
        },
        cli_args,
    )
}
