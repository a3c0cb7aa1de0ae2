//! Text analysis: tokens, tokenizers, lemmatization and the shared
//! surface-form patterns used by feature extraction and rules.

pub mod lemmatizer;
pub mod patterns;
pub mod token;
pub mod tokenizer;
