//! # querytag
//!
//! Entity tagging for short product search queries.
//!
//! Every token of a query such as `"молоко простоквашино 1л 3.5%"` is
//! labelled with a BIO tag over four entities: TYPE, BRAND, VOLUME and
//! PERCENT.
//!
//! ## Components
//!
//! - Tokenization and lemmatization ([`analysis`])
//! - A corpus-mined brand/type/unit [`lexicon`]
//! - Named per-token [`features`] in four configurations
//! - A cross-validated ensemble of CRF taggers stacked under a meta CRF
//!   ([`ml`])
//! - Regex [`rules`], an external [`recognizer`] hook and span
//!   [`postprocess`]ing, combined by the [`pipeline`]
//! - Checksummed model [`artifact`]s

pub mod analysis;
pub mod artifact;
pub mod bio;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod entity;
pub mod error;
pub mod eval;
pub mod features;
pub mod lexicon;
pub mod ml;
pub mod pipeline;
pub mod postprocess;
pub mod recognizer;
pub mod rules;

pub mod prelude {
    pub use crate::config::{ExtractorConfig, TrainingConfig};
    pub use crate::corpus::TrainingExample;
    pub use crate::entity::{EntityLabel, GoldSpan, Tag, TagRun};
    pub use crate::error::{QuerytagError, Result};
    pub use crate::ml::stacker::StackedTagger;
    pub use crate::pipeline::Extractor;
    pub use crate::postprocess::ProcessedSpan;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
