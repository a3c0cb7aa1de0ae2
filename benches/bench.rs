//! Criterion benchmarks for querytag.
//!
//! Covers the per-query hot path:
//! - Tokenization and feature building
//! - Stacked tagger inference
//! - The full extraction pipeline

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use querytag::analysis::tokenizer::TokenizerKind;
use querytag::config::{ExtractorConfig, TrainingConfig};
use querytag::corpus::TrainingExample;
use querytag::entity::GoldSpan;
use querytag::features::{FeatureBuilder, FeatureVariant};
use querytag::lexicon::LexiconBuilder;
use querytag::ml::stacker::StackedTagger;
use querytag::pipeline::Extractor;

/// Generate labelled `type brand volume` queries.
fn generate_corpus() -> Vec<TrainingExample> {
    let types = ["молоко", "кефир", "шоколад", "шампунь", "сок", "печенье"];
    let brands = ["простоквашино", "домик", "milka", "nivea", "добрый", "юбилейное"];
    let volumes = ["1л", "500мл", "90г", "0.5л"];

    let mut examples = Vec::new();
    for (i, kind) in types.iter().enumerate() {
        for (j, brand) in brands.iter().enumerate() {
            let volume = volumes[(i + j) % volumes.len()];
            let kind_len = kind.chars().count();
            let brand_start = kind_len + 1;
            let brand_end = brand_start + brand.chars().count();
            let volume_end = brand_end + 1 + volume.chars().count();
            examples.push(TrainingExample::new(
                format!("{kind} {brand} {volume}"),
                vec![
                    GoldSpan::new(0, kind_len, "B-TYPE"),
                    GoldSpan::new(brand_start, brand_end, "B-BRAND"),
                    GoldSpan::new(brand_end + 1, volume_end, "B-VOLUME"),
                ],
            ));
        }
    }
    examples
}

fn train_tagger(examples: &[TrainingExample]) -> StackedTagger {
    let mut config = TrainingConfig::default();
    config.cv.n_splits = 3;
    for params in config.base_crf.values_mut() {
        params.max_iterations = 50;
    }
    config.meta_crf.max_iterations = 50;
    StackedTagger::fit(examples, &config).unwrap()
}

/// Benchmark tokenization and feature building.
fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    let examples = generate_corpus();
    let tokenizer = TokenizerKind::default().build();
    let lexicon = Arc::new(LexiconBuilder::from_corpus(tokenizer.as_ref(), &examples));
    let query = "молоко простоквашино 3.2% 1л безлактозное";

    group.bench_function("tokenize", |b| {
        b.iter(|| black_box(tokenizer.tokenize(black_box(query))))
    });

    let tokens = tokenizer.tokenize(query);
    for variant in FeatureVariant::ALL {
        let builder = FeatureBuilder::for_variant(lexicon.clone(), variant);
        group.bench_function(format!("sentence_attributes_{variant}"), |b| {
            b.iter(|| black_box(builder.sentence_attributes(black_box(&tokens))))
        });
    }

    group.finish();
}

/// Benchmark inference.
fn bench_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.sample_size(20); // Each query runs every fold model

    let examples = generate_corpus();
    let tagger = train_tagger(&examples);
    let queries: Vec<String> = examples.iter().map(|e| e.text.clone()).collect();

    group.bench_function("predict_single_query", |b| {
        b.iter(|| black_box(tagger.predict(black_box(&queries[0])).unwrap()))
    });

    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function("predict_batch", |b| {
        b.iter(|| black_box(tagger.predict_batch(black_box(&queries)).unwrap()))
    });

    let extractor = Extractor::new(ExtractorConfig::default(), tagger).unwrap();
    group.throughput(Throughput::Elements(1));
    group.bench_function("extract_single_query", |b| {
        b.iter(|| black_box(extractor.extract(black_box("кефир домик 1л 2.5%")).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_features, bench_inference);
criterion_main!(benches);
