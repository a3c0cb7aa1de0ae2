//! Command line argument parsing for the querytag CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// querytag - entity tagging for product search queries
#[derive(Parser, Debug, Clone)]
#[command(name = "querytag")]
#[command(about = "Stacked CRF entity tagger for short product search queries")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct QuerytagArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log record format
    #[arg(long, default_value = "text", env = "QUERYTAG_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuerytagArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a stacked tagger and save it as an artifact
    Train(TrainArgs),

    /// Tag one or more queries
    Predict(PredictArgs),

    /// Score a model against a labelled corpus
    Evaluate(EvaluateArgs),

    /// Show model metadata
    Inspect(InspectArgs),
}

/// Corpus parsing options shared by commands that read labelled data
#[derive(Parser, Debug, Clone)]
pub struct CorpusArgs {
    /// Labelled corpus (.jsonl/.json, otherwise delimited text)
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: PathBuf,

    /// Field delimiter for delimited corpora
    #[arg(long, default_value = ";")]
    pub delimiter: char,

    /// Column holding the query text
    #[arg(long, default_value = "sample")]
    pub text_column: String,

    /// Column holding the gold span literal
    #[arg(long, default_value = "annotation")]
    pub spans_column: String,
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Where to write the model artifact
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub output: PathBuf,

    /// Training configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Override the number of folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Override the number of training threads
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// Model artifact
    #[arg(short, long, env = "QUERYTAG_MODEL", value_name = "MODEL_FILE")]
    pub model: PathBuf,

    /// Print per-token tags instead of entity spans
    #[arg(long)]
    pub tokens: bool,

    /// Skip the VOLUME/PERCENT regex rules
    #[arg(long)]
    pub no_rules: bool,

    /// Add lexicon matches as external BRAND/TYPE candidates
    #[arg(long)]
    pub gazetteer: bool,

    /// Minimum confidence for external candidates
    #[arg(long, default_value = "0.4")]
    pub min_confidence: f64,

    /// Queries to tag
    #[arg(value_name = "TEXT", required = true)]
    pub texts: Vec<String>,
}

/// Arguments for evaluation
#[derive(Parser, Debug, Clone)]
pub struct EvaluateArgs {
    /// Model artifact
    #[arg(short, long, env = "QUERYTAG_MODEL", value_name = "MODEL_FILE")]
    pub model: PathBuf,

    #[command(flatten)]
    pub corpus: CorpusArgs,
}

/// Arguments for model inspection
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    /// Model artifact
    #[arg(short, long, env = "QUERYTAG_MODEL", value_name = "MODEL_FILE")]
    pub model: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Log record formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `[LEVEL] message`
    Text,
    /// One JSON object per record
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_train_command() {
        let args = QuerytagArgs::try_parse_from([
            "querytag",
            "train",
            "--data",
            "corpus.csv",
            "--output",
            "model.bin",
            "--delimiter",
            ",",
            "--folds",
            "3",
        ])
        .unwrap();

        if let Command::Train(train_args) = args.command {
            assert_eq!(train_args.corpus.data, PathBuf::from("corpus.csv"));
            assert_eq!(train_args.output, PathBuf::from("model.bin"));
            assert_eq!(train_args.corpus.delimiter, ',');
            assert_eq!(train_args.corpus.text_column, "sample");
            assert_eq!(train_args.folds, Some(3));
            assert_eq!(train_args.config, None);
        } else {
            panic!("Expected Train command");
        }
    }

    #[test]
    fn test_predict_command() {
        let args = QuerytagArgs::try_parse_from([
            "querytag",
            "predict",
            "--model",
            "model.bin",
            "--tokens",
            "молоко 1л",
            "кефир 2.5%",
        ])
        .unwrap();

        if let Command::Predict(predict_args) = args.command {
            assert_eq!(predict_args.model, PathBuf::from("model.bin"));
            assert!(predict_args.tokens);
            assert!(!predict_args.gazetteer);
            assert_eq!(predict_args.min_confidence, 0.4);
            assert_eq!(predict_args.texts, vec!["молоко 1л", "кефир 2.5%"]);
        } else {
            panic!("Expected Predict command");
        }
    }

    #[test]
    fn test_predict_requires_text() {
        let result = QuerytagArgs::try_parse_from(["querytag", "predict", "--model", "m.bin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        // Default verbosity
        let args = QuerytagArgs::try_parse_from(["querytag", "inspect", "-m", "m.bin"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        // Multiple verbose flags
        let args =
            QuerytagArgs::try_parse_from(["querytag", "-vv", "inspect", "-m", "m.bin"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        // Quiet flag
        let args =
            QuerytagArgs::try_parse_from(["querytag", "--quiet", "inspect", "-m", "m.bin"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_and_log_format() {
        let args = QuerytagArgs::try_parse_from([
            "querytag",
            "--format",
            "json",
            "--log-format",
            "json",
            "inspect",
            "-m",
            "m.bin",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
