//! Brand, type and unit vocabularies mined from a labelled corpus.
//!
//! A [`Lexicon`] is built once by [`LexiconBuilder`] and is read-only
//! afterwards. The three sets are disjoint: a surface form that looks like
//! a unit belongs to the unit set only, and any other form goes to
//! whichever of brand/type it was tagged with more often (ties go to brand).

use ahash::{AHashMap, AHashSet};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::patterns::{NUM_UNIT_STUCK, UNIT, strip_numeric_prefix};
use crate::analysis::tokenizer::Tokenizer;
use crate::bio::spans_to_bio;
use crate::corpus::TrainingExample;
use crate::entity::EntityLabel;

/// Lowercase surface forms per category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    brands: AHashSet<String>,
    types: AHashSet<String>,
    units: AHashSet<String>,
}

impl Lexicon {
    pub fn contains_brand(&self, word: &str) -> bool {
        self.brands.contains(word)
    }

    pub fn contains_type(&self, word: &str) -> bool {
        self.types.contains(word)
    }

    pub fn contains_unit(&self, word: &str) -> bool {
        self.units.contains(word)
    }

    /// Sizes of the brand, type and unit sets.
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.brands.len(), self.types.len(), self.units.len())
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty() && self.types.is_empty() && self.units.is_empty()
    }
}

#[derive(Default)]
struct Counts {
    brand: usize,
    kind: usize,
}

/// Accumulates tagged surface forms and resolves them into a [`Lexicon`].
pub struct LexiconBuilder<'a> {
    tokenizer: &'a dyn Tokenizer,
    entity_counts: AHashMap<String, Counts>,
    units: AHashSet<String>,
}

impl<'a> LexiconBuilder<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        LexiconBuilder {
            tokenizer,
            entity_counts: AHashMap::new(),
            units: AHashSet::new(),
        }
    }

    /// Count the tagged tokens of one example.
    pub fn add_example(&mut self, example: &TrainingExample) {
        let tokens = self.tokenizer.tokenize(&example.text);
        let tags = spans_to_bio(&tokens, &example.spans);

        for (token, tag) in tokens.iter().zip(tags) {
            let lower = token.text.to_lowercase();

            if UNIT.is_match(&lower) {
                self.units.insert(lower.clone());
            }
            if NUM_UNIT_STUCK.is_match(&lower) {
                self.units.insert(strip_numeric_prefix(&lower).to_string());
            }

            match tag.entity() {
                Some(EntityLabel::Brand) => self.entity_counts.entry(lower).or_default().brand += 1,
                Some(EntityLabel::Type) => self.entity_counts.entry(lower).or_default().kind += 1,
                _ => {}
            }
        }
    }

    /// Resolve the counts into disjoint sets.
    pub fn build(self) -> Lexicon {
        let mut lexicon = Lexicon {
            units: self.units,
            ..Lexicon::default()
        };

        for (word, counts) in self.entity_counts {
            if UNIT.is_match(&word) || lexicon.units.contains(&word) {
                continue;
            }
            if counts.brand >= counts.kind {
                lexicon.brands.insert(word);
            } else {
                lexicon.types.insert(word);
            }
        }

        let (brands, types, units) = lexicon.sizes();
        info!("Built lexicon: {brands} brands, {types} types, {units} units");
        lexicon
    }

    /// Build a lexicon from a whole corpus.
    pub fn from_corpus(tokenizer: &'a dyn Tokenizer, examples: &[TrainingExample]) -> Lexicon {
        let mut builder = LexiconBuilder::new(tokenizer);
        for example in examples {
            builder.add_example(example);
        }
        builder.build()
    }
}
