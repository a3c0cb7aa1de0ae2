//! Error types for the querytag library.
//!
//! All fallible operations return [`Result`], whose error side is
//! [`QuerytagError`]. Errors raised while fitting or evaluating taggers are
//! described by [`MLError`](crate::ml::MLError) and convert into
//! [`QuerytagError::Ml`] with `?`.
//!
//! # Examples
//!
//! ```
//! use querytag::error::{QuerytagError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QuerytagError::invalid_argument("empty corpus"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::ml::MLError;

/// The main error type for querytag operations.
#[derive(Error, Debug)]
pub enum QuerytagError {
    /// I/O errors (corpus files, model artifacts)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Analysis-related errors (tokenization, lemmatization)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Tagger training and inference errors
    #[error(transparent)]
    Ml(#[from] MLError),

    /// Missing, truncated or corrupt model artifact
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Corpus loading errors
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A blocking inference task could not be joined
    #[error("Thread join error: {0}")]
    ThreadJoinError(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with QuerytagError.
pub type Result<T> = std::result::Result<T, QuerytagError>;

impl QuerytagError {
    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Analysis(msg.into())
    }

    /// Create a new artifact error.
    pub fn artifact<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Artifact(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Config(msg.into())
    }

    /// Create a new corpus error.
    pub fn corpus<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Corpus(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QuerytagError::Other(format!("Invalid argument: {}", msg.into()))
    }
}

impl From<bincode::Error> for QuerytagError {
    fn from(err: bincode::Error) -> Self {
        QuerytagError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QuerytagError::analysis("bad token");
        assert_eq!(error.to_string(), "Analysis error: bad token");

        let error = QuerytagError::artifact("checksum mismatch");
        assert_eq!(error.to_string(), "Artifact error: checksum mismatch");

        let error = QuerytagError::config("n_splits must be >= 2");
        assert_eq!(error.to_string(), "Configuration error: n_splits must be >= 2");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = QuerytagError::from(io_error);

        match error {
            QuerytagError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_ml_error_conversion() {
        let error: QuerytagError = MLError::DataIntegrity {
            message: "missing OOF row".to_string(),
        }
        .into();
        assert!(matches!(error, QuerytagError::Ml(_)));
        assert_eq!(error.to_string(), "Data integrity failure: missing OOF row");
    }
}
