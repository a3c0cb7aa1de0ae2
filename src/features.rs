//! Per-token feature extraction.
//!
//! A [`FeatureBuilder`] turns a tokenized sentence into one
//! [`FeatureVector`] per token. The set of fields is fixed by a
//! [`FeatureConfig`] when the builder is constructed and described by a
//! [`FeatureSchema`]; the sequence taggers consume the flattened
//! [`Attribute`] form produced by [`FeatureBuilder::to_attributes`].
//!
//! Four named configurations exist as [`FeatureVariant`]s:
//!
//! | variant | id | lemma | window | bigrams |
//! |---|---|---|---|---|
//! | Minimal | A | no | 1 | no |
//! | Lexicon | B | yes | 1 | yes |
//! | Wide | C | yes | 2 | yes |
//! | ExtraWide | D | yes | 4 | yes |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::lemmatizer::{Lemmatizer, LemmatizerKind};
use crate::analysis::patterns::{
    NUM_UNIT_STUCK, PERCENT_LIKE, TRADEMARK, VOLUME_LIKE, has_mixed_script,
};
use crate::analysis::token::Token;
use crate::lexicon::Lexicon;

/// Value of one feature at one token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

/// Declared type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Bool,
    Num,
    Str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureField {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureField {
    fn new<S: Into<String>>(name: S, kind: FeatureKind) -> Self {
        FeatureField {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered list of the fields a configuration emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    fields: Vec<FeatureField>,
}

const BASE_FIELDS: &[(&str, FeatureKind)] = &[
    ("bias", FeatureKind::Num),
    ("w", FeatureKind::Str),
    ("shape", FeatureKind::Str),
    ("is_title", FeatureKind::Bool),
    ("is_upper", FeatureKind::Bool),
    ("is_digit", FeatureKind::Bool),
    ("len", FeatureKind::Num),
    ("pre1", FeatureKind::Str),
    ("pre2", FeatureKind::Str),
    ("pre3", FeatureKind::Str),
    ("pre4", FeatureKind::Str),
    ("suf1", FeatureKind::Str),
    ("suf2", FeatureKind::Str),
    ("suf3", FeatureKind::Str),
    ("suf4", FeatureKind::Str),
    ("has_tm", FeatureKind::Bool),
    ("is_num_unit_stuck", FeatureKind::Bool),
    ("is_volume_like", FeatureKind::Bool),
    ("is_percent_like", FeatureKind::Bool),
    ("has_mixed_script", FeatureKind::Bool),
    ("in_brand_lex", FeatureKind::Bool),
    ("in_type_lex", FeatureKind::Bool),
    ("in_unit_lex", FeatureKind::Bool),
    ("BOS", FeatureKind::Bool),
    ("EOS", FeatureKind::Bool),
];

impl FeatureSchema {
    /// Resolve the field list for a configuration.
    pub fn new(config: &FeatureConfig) -> Self {
        let mut fields: Vec<FeatureField> = BASE_FIELDS
            .iter()
            .map(|(name, kind)| FeatureField::new(*name, *kind))
            .collect();

        if config.use_lemma {
            fields.push(FeatureField::new("lemma", FeatureKind::Str));
        }
        for sign in ['-', '+'] {
            for k in 1..=config.window {
                fields.push(FeatureField::new(format!("{sign}{k}:w"), FeatureKind::Str));
                fields.push(FeatureField::new(format!("{sign}{k}:shape"), FeatureKind::Str));
            }
        }
        if config.use_bigrams {
            fields.push(FeatureField::new("-1_bigram", FeatureKind::Str));
            fields.push(FeatureField::new("+1_bigram", FeatureKind::Str));
        }

        FeatureSchema { fields }
    }

    pub fn fields(&self) -> &[FeatureField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Values aligned with a [`FeatureSchema`]; `None` where a field does not
/// apply at this position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<Option<FeatureValue>>,
}

impl FeatureVector {
    pub fn values(&self) -> &[Option<FeatureValue>] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&FeatureValue> {
        self.values.get(index).and_then(Option::as_ref)
    }
}

/// A weighted, named input to a sequence tagger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: f64,
}

impl Attribute {
    pub fn new<S: Into<String>>(name: S, value: f64) -> Self {
        Attribute {
            name: name.into(),
            value,
        }
    }
}

/// Knobs that select the optional feature groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Emit the `lemma` field.
    pub use_lemma: bool,
    /// Context window on each side.
    pub window: usize,
    /// Emit `-1_bigram` and `+1_bigram`.
    pub use_bigrams: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureVariant::Wide.config()
    }
}

/// The named feature configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureVariant {
    #[serde(rename = "A")]
    Minimal,
    #[serde(rename = "B")]
    Lexicon,
    #[serde(rename = "C")]
    Wide,
    #[serde(rename = "D")]
    ExtraWide,
}

impl FeatureVariant {
    pub const ALL: [FeatureVariant; 4] = [
        FeatureVariant::Minimal,
        FeatureVariant::Lexicon,
        FeatureVariant::Wide,
        FeatureVariant::ExtraWide,
    ];

    /// Base variants trained when nothing else is configured.
    pub const DEFAULT_BASE: [FeatureVariant; 3] = [
        FeatureVariant::Minimal,
        FeatureVariant::Lexicon,
        FeatureVariant::Wide,
    ];

    /// Short id used to prefix meta attributes.
    pub fn id(self) -> &'static str {
        match self {
            FeatureVariant::Minimal => "A",
            FeatureVariant::Lexicon => "B",
            FeatureVariant::Wide => "C",
            FeatureVariant::ExtraWide => "D",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        FeatureVariant::ALL.into_iter().find(|v| v.id() == id.trim())
    }

    pub fn config(self) -> FeatureConfig {
        let (use_lemma, window, use_bigrams) = match self {
            FeatureVariant::Minimal => (false, 1, false),
            FeatureVariant::Lexicon => (true, 1, true),
            FeatureVariant::Wide => (true, 2, true),
            FeatureVariant::ExtraWide => (true, 4, true),
        };
        FeatureConfig {
            use_lemma,
            window,
            use_bigrams,
        }
    }
}

impl fmt::Display for FeatureVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Word shape: digits → `d`, upper-case letters → `X`, other letters → `x`,
/// anything else unchanged.
pub fn word_shape(word: &str) -> String {
    word.chars()
        .map(|c| {
            if c.is_numeric() {
                'd'
            } else if c.is_alphabetic() {
                if c.is_uppercase() { 'X' } else { 'x' }
            } else {
                c
            }
        })
        .collect()
}

/// Title case: at least one cased character, upper-case letters only at
/// the start of a cased run and lower-case letters only inside one.
fn is_title(word: &str) -> bool {
    let mut cased = false;
    let mut prev_cased = false;
    for c in word.chars() {
        if c.is_uppercase() {
            if prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else {
            prev_cased = false;
        }
    }
    cased
}

fn is_upper(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}

fn is_digit(word: &str) -> bool {
    !word.is_empty() && word.chars().all(char::is_numeric)
}

fn prefix(word: &str, n: usize) -> String {
    word.chars().take(n).collect()
}

fn suffix(word: &str, n: usize) -> String {
    let len = word.chars().count();
    word.chars().skip(len.saturating_sub(n)).collect()
}

/// Builds feature vectors for one configuration.
#[derive(Clone)]
pub struct FeatureBuilder {
    lexicon: Arc<Lexicon>,
    config: FeatureConfig,
    schema: FeatureSchema,
    lemmatizer: Arc<dyn Lemmatizer>,
}

impl fmt::Debug for FeatureBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureBuilder")
            .field("config", &self.config)
            .field("fields", &self.schema.len())
            .field("lemmatizer", &self.lemmatizer.name())
            .finish()
    }
}

impl FeatureBuilder {
    pub fn new(lexicon: Arc<Lexicon>, config: FeatureConfig) -> Self {
        Self::with_lemmatizer(lexicon, config, LemmatizerKind::default().build().into())
    }

    pub fn for_variant(lexicon: Arc<Lexicon>, variant: FeatureVariant) -> Self {
        Self::new(lexicon, variant.config())
    }

    pub fn with_lemmatizer(
        lexicon: Arc<Lexicon>,
        config: FeatureConfig,
        lemmatizer: Arc<dyn Lemmatizer>,
    ) -> Self {
        FeatureBuilder {
            lexicon,
            schema: FeatureSchema::new(&config),
            config,
            lemmatizer,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn lemma(&self, word: &str) -> String {
        self.lemmatizer
            .lemma(word)
            .unwrap_or_else(|_| word.to_lowercase())
    }

    /// Features of the token at `i`.
    pub fn token_features(&self, tokens: &[Token], i: usize) -> FeatureVector {
        let mut values = Vec::with_capacity(self.schema.len());
        let word = tokens[i].text.as_str();
        let lower = word.to_lowercase();

        values.push(Some(FeatureValue::Num(1.0)));
        values.push(Some(FeatureValue::Str(lower.clone())));
        values.push(Some(FeatureValue::Str(word_shape(word))));
        values.push(Some(FeatureValue::Bool(is_title(word))));
        values.push(Some(FeatureValue::Bool(is_upper(word))));
        values.push(Some(FeatureValue::Bool(is_digit(word))));
        values.push(Some(FeatureValue::Num(word.chars().count() as f64)));
        for n in 1..=4 {
            values.push(Some(FeatureValue::Str(prefix(&lower, n))));
        }
        for n in 1..=4 {
            values.push(Some(FeatureValue::Str(suffix(&lower, n))));
        }
        values.push(Some(FeatureValue::Bool(TRADEMARK.is_match(word))));
        values.push(Some(FeatureValue::Bool(NUM_UNIT_STUCK.is_match(&lower))));
        values.push(Some(FeatureValue::Bool(VOLUME_LIKE.is_match(word))));
        values.push(Some(FeatureValue::Bool(PERCENT_LIKE.is_match(word))));
        values.push(Some(FeatureValue::Bool(has_mixed_script(word))));
        values.push(Some(FeatureValue::Bool(self.lexicon.contains_brand(&lower))));
        values.push(Some(FeatureValue::Bool(self.lexicon.contains_type(&lower))));
        values.push(Some(FeatureValue::Bool(self.lexicon.contains_unit(&lower))));
        values.push(Some(FeatureValue::Bool(i == 0)));
        values.push(Some(FeatureValue::Bool(i + 1 == tokens.len())));

        if self.config.use_lemma {
            values.push(Some(FeatureValue::Str(self.lemma(word))));
        }

        for k in 1..=self.config.window {
            let ctx = i.checked_sub(k).map(|j| tokens[j].text.as_str());
            values.push(ctx.map(|w| FeatureValue::Str(w.to_lowercase())));
            values.push(ctx.map(|w| FeatureValue::Str(word_shape(w))));
        }
        for k in 1..=self.config.window {
            let ctx = tokens.get(i + k).map(|t| t.text.as_str());
            values.push(ctx.map(|w| FeatureValue::Str(w.to_lowercase())));
            values.push(ctx.map(|w| FeatureValue::Str(word_shape(w))));
        }

        if self.config.use_bigrams {
            let multi = tokens.len() > 1;
            let prev = (multi && i > 0)
                .then(|| format!("{}__{lower}", tokens[i - 1].text.to_lowercase()));
            let next = (multi && i + 1 < tokens.len())
                .then(|| format!("{lower}__{}", tokens[i + 1].text.to_lowercase()));
            values.push(prev.map(FeatureValue::Str));
            values.push(next.map(FeatureValue::Str));
        }

        debug_assert_eq!(values.len(), self.schema.len());
        FeatureVector { values }
    }

    pub fn sentence_features(&self, tokens: &[Token]) -> Vec<FeatureVector> {
        (0..tokens.len())
            .map(|i| self.token_features(tokens, i))
            .collect()
    }

    /// Flatten a vector into tagger attributes: strings become `name=value`
    /// with weight 1, `true` becomes `name` with weight 1, `false` and
    /// missing fields are dropped, numbers keep their value as weight.
    pub fn to_attributes(&self, vector: &FeatureVector) -> Vec<Attribute> {
        self.schema
            .fields()
            .iter()
            .zip(vector.values())
            .filter_map(|(field, value)| match value.as_ref()? {
                FeatureValue::Str(s) => Some(Attribute::new(format!("{}={s}", field.name), 1.0)),
                FeatureValue::Bool(true) => Some(Attribute::new(field.name.as_str(), 1.0)),
                FeatureValue::Bool(false) => None,
                FeatureValue::Num(v) => Some(Attribute::new(field.name.as_str(), *v)),
            })
            .collect()
    }

    /// Attributes for every token of a sentence.
    pub fn sentence_attributes(&self, tokens: &[Token]) -> Vec<Vec<Attribute>> {
        self.sentence_features(tokens)
            .iter()
            .map(|v| self.to_attributes(v))
            .collect()
    }

    /// Look a field up by name.
    pub fn lookup<'v>(&self, vector: &'v FeatureVector, name: &str) -> Option<&'v FeatureValue> {
        self.schema.index_of(name).and_then(|i| vector.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
    use crate::corpus::TrainingExample;
    use crate::entity::GoldSpan;
    use crate::lexicon::LexiconBuilder;

    fn lexicon() -> Arc<Lexicon> {
        let tokenizer = WhitespaceTokenizer::new();
        let examples = vec![TrainingExample::new(
            "milka шоколад",
            vec![GoldSpan::new(0, 5, "B-BRAND"), GoldSpan::new(6, 13, "B-TYPE")],
        )];
        Arc::new(LexiconBuilder::from_corpus(&tokenizer, &examples))
    }

    fn text(s: &str) -> Option<FeatureValue> {
        Some(FeatureValue::Str(s.to_string()))
    }

    #[test]
    fn test_word_shape_and_case() {
        assert_eq!(word_shape("Milka90%"), "Xxxxxdd%");
        assert_eq!(word_shape("Мл"), "Xx");
        assert!(is_title("Milka"));
        assert!(is_title("Coca-Cola"));
        assert!(!is_title("MILKA"));
        assert!(!is_title("90"));
        assert!(is_upper("UHT2"));
        assert!(!is_upper("90"));
        assert!(is_digit("90"));
        assert!(!is_digit("3.5"));
    }

    #[test]
    fn test_schema_follows_config() {
        let a = FeatureSchema::new(&FeatureVariant::Minimal.config());
        let c = FeatureSchema::new(&FeatureVariant::Wide.config());
        assert!(a.index_of("lemma").is_none());
        assert!(a.index_of("-1_bigram").is_none());
        assert!(a.index_of("-2:w").is_none());
        assert!(c.index_of("lemma").is_some());
        assert!(c.index_of("+2:shape").is_some());
        assert_eq!(c.len(), BASE_FIELDS.len() + 1 + 8 + 2);
    }

    #[test]
    fn test_token_features() {
        let builder = FeatureBuilder::for_variant(lexicon(), FeatureVariant::Wide);
        let tokens = WhitespaceTokenizer::new().tokenize("Milka шоколад 90г");
        let feats = builder.sentence_features(&tokens);

        let first = &feats[0];
        assert_eq!(builder.lookup(first, "w").cloned(), text("milka"));
        assert_eq!(builder.lookup(first, "shape").cloned(), text("Xxxxx"));
        assert_eq!(builder.lookup(first, "in_brand_lex"), Some(&FeatureValue::Bool(true)));
        assert_eq!(builder.lookup(first, "BOS"), Some(&FeatureValue::Bool(true)));
        assert_eq!(builder.lookup(first, "-1:w"), None);
        assert_eq!(builder.lookup(first, "+2:w").cloned(), text("90г"));
        assert_eq!(builder.lookup(first, "-1_bigram"), None);
        assert_eq!(builder.lookup(first, "+1_bigram").cloned(), text("milka__шоколад"));

        let last = &feats[2];
        assert_eq!(builder.lookup(last, "is_num_unit_stuck"), Some(&FeatureValue::Bool(true)));
        assert_eq!(builder.lookup(last, "is_volume_like"), Some(&FeatureValue::Bool(true)));
        assert_eq!(builder.lookup(last, "len"), Some(&FeatureValue::Num(3.0)));
        assert_eq!(builder.lookup(last, "suf2").cloned(), text("0г"));
        assert_eq!(builder.lookup(last, "EOS"), Some(&FeatureValue::Bool(true)));
    }

    #[test]
    fn test_single_token_has_no_bigrams() {
        let builder = FeatureBuilder::for_variant(lexicon(), FeatureVariant::Lexicon);
        let tokens = WhitespaceTokenizer::new().tokenize("молоко");
        let feats = builder.sentence_features(&tokens);
        assert_eq!(builder.lookup(&feats[0], "-1_bigram"), None);
        assert_eq!(builder.lookup(&feats[0], "+1_bigram"), None);
        assert_eq!(builder.lookup(&feats[0], "BOS"), Some(&FeatureValue::Bool(true)));
        assert_eq!(builder.lookup(&feats[0], "EOS"), Some(&FeatureValue::Bool(true)));
    }

    #[test]
    fn test_lemma_falls_back_to_lowercase() {
        let builder = FeatureBuilder::for_variant(lexicon(), FeatureVariant::Lexicon);
        let tokens = WhitespaceTokenizer::new().tokenize("3.5% Молока");
        let feats = builder.sentence_features(&tokens);
        assert_eq!(builder.lookup(&feats[0], "lemma").cloned(), text("3.5%"));
        assert_eq!(builder.lookup(&feats[1], "lemma").cloned(), text("молок"));
    }

    #[test]
    fn test_to_attributes() {
        let builder = FeatureBuilder::for_variant(lexicon(), FeatureVariant::Minimal);
        let tokens = WhitespaceTokenizer::new().tokenize("Milka");
        let attrs = builder.sentence_attributes(&tokens).remove(0);
        let has = |name: &str, value: f64| attrs.iter().any(|a| a.name == name && a.value == value);

        assert!(has("bias", 1.0));
        assert!(has("w=milka", 1.0));
        assert!(has("is_title", 1.0));
        assert!(has("len", 5.0));
        assert!(has("in_brand_lex", 1.0));
        assert!(!attrs.iter().any(|a| a.name == "is_upper"));
        assert!(!attrs.iter().any(|a| a.name.starts_with("lemma")));
    }

    #[test]
    fn test_variant_ids() {
        for variant in FeatureVariant::ALL {
            assert_eq!(FeatureVariant::from_id(variant.id()), Some(variant));
        }
        assert_eq!(FeatureVariant::ExtraWide.config().window, 4);
        assert_eq!(FeatureConfig::default(), FeatureVariant::Wide.config());
        let json = serde_json::to_string(&FeatureVariant::Lexicon).unwrap();
        assert_eq!(json, "\"B\"");
    }
}
