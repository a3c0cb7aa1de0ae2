//! Sequence tagging models.
//!
//! - [`crf`] - linear-chain CRF over `crfs`: L-BFGS training, marginals and
//!   Viterbi decoding
//! - [`ensemble`] - cross-validated base ensemble producing out-of-fold tag
//!   distributions
//! - [`stacker`] - meta tagger trained on base-ensemble probabilities
//! - [`models`] - the [`SequenceTagger`](models::SequenceTagger) trait and
//!   training bookkeeping

pub mod crf;
pub mod ensemble;
pub mod models;
pub mod stacker;

use thiserror::Error;

/// Errors raised while fitting or running taggers.
#[derive(Error, Debug)]
pub enum MLError {
    #[error("Model not trained: {message}")]
    ModelNotTrained { message: String },

    #[error("Invalid feature vector: {message}")]
    InvalidFeatureVector { message: String },

    #[error("Training data insufficient: need at least {min_samples} samples, got {actual}")]
    InsufficientTrainingData { min_samples: usize, actual: usize },

    #[error("Data integrity failure: {message}")]
    DataIntegrity { message: String },

    #[error("CRF backend error: {message}")]
    Backend { message: String },
}

impl MLError {
    pub fn integrity<S: Into<String>>(message: S) -> Self {
        MLError::DataIntegrity {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MLError::InsufficientTrainingData {
            min_samples: 5,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Training data insufficient: need at least 5 samples, got 3"
        );
        assert_eq!(
            MLError::integrity("sentence 4 has no OOF row").to_string(),
            "Data integrity failure: sentence 4 has no OOF row"
        );
    }
}
