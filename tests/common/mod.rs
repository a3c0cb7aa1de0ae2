//! Synthetic product-query corpus shared by the integration tests.

#![allow(dead_code)]

use querytag::config::TrainingConfig;
use querytag::corpus::TrainingExample;
use querytag::entity::GoldSpan;

const TYPES: [&str; 4] = ["молоко", "кефир", "шоколад", "шампунь"];
const BRANDS: [&str; 4] = ["простоквашино", "домик", "milka", "nivea"];
const VOLUMES: [&str; 3] = ["1л", "500мл", "90г"];
const PERCENTS: [&str; 3] = ["3.5%", "2.5%", "15%"];

/// Builds a query from labelled pieces, tracking character offsets.
struct QueryBuilder {
    text: String,
    spans: Vec<GoldSpan>,
    chars: usize,
}

impl QueryBuilder {
    fn new() -> Self {
        QueryBuilder {
            text: String::new(),
            spans: Vec::new(),
            chars: 0,
        }
    }

    fn push(mut self, word: &str, label: &str) -> Self {
        if !self.text.is_empty() {
            self.text.push(' ');
            self.chars += 1;
        }
        let len = word.chars().count();
        self.spans.push(GoldSpan::new(self.chars, self.chars + len, label));
        self.text.push_str(word);
        self.chars += len;
        self
    }

    fn build(self) -> TrainingExample {
        TrainingExample::new(self.text, self.spans)
    }
}

/// Deterministic corpus of `type brand volume [percent]` queries.
pub fn corpus() -> Vec<TrainingExample> {
    let mut examples = Vec::new();
    for (i, kind) in TYPES.iter().enumerate() {
        for (j, brand) in BRANDS.iter().enumerate() {
            let volume = VOLUMES[(i + j) % VOLUMES.len()];
            let mut query = QueryBuilder::new()
                .push(kind, "B-TYPE")
                .push(brand, "B-BRAND")
                .push(volume, "B-VOLUME");
            if (i + j) % 2 == 0 {
                query = query.push(PERCENTS[(i * j) % PERCENTS.len()], "B-PERCENT");
            }
            examples.push(query.build());

            examples.push(
                QueryBuilder::new()
                    .push(brand, "B-BRAND")
                    .push(kind, "B-TYPE")
                    .build(),
            );
        }
    }
    examples
}

/// A small, fast configuration.
pub fn fast_config() -> TrainingConfig {
    let mut config = TrainingConfig::default();
    config.cv.n_splits = 3;
    config.threads = 2;
    for params in config.base_crf.values_mut() {
        params.max_iterations = 50;
    }
    config.meta_crf.max_iterations = 80;
    config
}
