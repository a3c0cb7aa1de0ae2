//! Output formatting for CLI commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, QuerytagArgs};
use crate::error::Result;
use crate::ml::models::ModelMetadata;

/// Result structure for training.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub model_path: String,
    pub examples: usize,
    pub sentences: usize,
    pub n_splits: usize,
    pub variants: Vec<String>,
    pub lexicon: LexiconSizes,
    pub duration_ms: u64,
    pub validation_metrics: BTreeMap<String, f64>,
}

/// Lexicon set sizes.
#[derive(Debug, Serialize, Deserialize)]
pub struct LexiconSizes {
    pub brands: usize,
    pub types: usize,
    pub units: usize,
}

/// One entity span of a prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct SpanOutput {
    pub start: usize,
    pub end: usize,
    pub tag: String,
    pub text: String,
}

/// One token of a prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenOutput {
    pub token: String,
    pub start: usize,
    pub end: usize,
    pub tag: String,
}

/// Prediction for one query.
#[derive(Debug, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spans: Option<Vec<SpanOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<TokenOutput>>,
}

/// Result structure for prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResults {
    pub predictions: Vec<Prediction>,
    pub duration_ms: u64,
}

/// Result structure for model inspection.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: String,
    pub file_size_bytes: u64,
    pub tokenizer: String,
    pub lexicon: LexiconSizes,
    pub meta_attributes: usize,
    pub metadata: ModelMetadata,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &QuerytagArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &QuerytagArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    // Convert to JSON value for easier manipulation
    let value = serde_json::to_value(result)?;

    match std::any::type_name::<T>() {
        name if name.ends_with("PredictionResults") => output_predictions_human(&value),
        name if name.ends_with("EvaluationReport") => output_evaluation_human(&value),
        _ => output_generic_human(&value, 0),
    }

    Ok(())
}

/// Output predictions in human format.
fn output_predictions_human(value: &serde_json::Value) {
    let Some(predictions) = value.get("predictions").and_then(|p| p.as_array()) else {
        return;
    };

    for prediction in predictions {
        let text = prediction.get("text").and_then(|t| t.as_str()).unwrap_or("");
        println!("{text}");

        if let Some(spans) = prediction.get("spans").and_then(|s| s.as_array()) {
            if spans.is_empty() {
                println!("  (no entities)");
            }
            for span in spans {
                println!(
                    "  {:>3}..{:<3} {:<10} {}",
                    span.get("start").and_then(|v| v.as_u64()).unwrap_or(0),
                    span.get("end").and_then(|v| v.as_u64()).unwrap_or(0),
                    span.get("tag").and_then(|v| v.as_str()).unwrap_or(""),
                    span.get("text").and_then(|v| v.as_str()).unwrap_or("")
                );
            }
        }

        if let Some(tokens) = prediction.get("tokens").and_then(|t| t.as_array()) {
            for token in tokens {
                println!(
                    "  {:<20} {}",
                    token.get("token").and_then(|v| v.as_str()).unwrap_or(""),
                    token.get("tag").and_then(|v| v.as_str()).unwrap_or("")
                );
            }
        }
        println!();
    }
}

/// Output an evaluation report in human format.
fn output_evaluation_human(value: &serde_json::Value) {
    let number = |v: Option<&serde_json::Value>| v.and_then(|n| n.as_f64()).unwrap_or(0.0);

    println!(
        "Sentences: {}  Tokens: {}",
        value.get("sentences").and_then(|v| v.as_u64()).unwrap_or(0),
        value.get("tokens").and_then(|v| v.as_u64()).unwrap_or(0)
    );
    println!("Token accuracy: {:.4}", number(value.get("token_accuracy")));
    println!();
    println!("{:<10} {:>9} {:>9} {:>9} {:>8}", "entity", "precision", "recall", "f1", "support");
    println!("{}", "─".repeat(49));

    let row = |name: &str, metrics: &serde_json::Value| {
        println!(
            "{:<10} {:>9.4} {:>9.4} {:>9.4} {:>8}",
            name,
            number(metrics.get("precision")),
            number(metrics.get("recall")),
            number(metrics.get("f1")),
            metrics.get("expected").and_then(|v| v.as_u64()).unwrap_or(0)
        );
    };

    if let Some(per_type) = value.get("per_type").and_then(|p| p.as_object()) {
        for (name, metrics) in per_type {
            row(name, metrics);
        }
    }
    if let Some(micro) = value.get("micro") {
        println!("{}", "─".repeat(49));
        row("micro", micro);
    }
}

/// Generic human-readable output.
fn output_generic_human(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{pad}{key}:");
                        output_generic_human(val, indent + 1);
                    }
                    _ => println!("{pad}{key}: {}", scalar(val)),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        output_generic_human(item, indent + 1)
                    }
                    _ => println!("{pad}- {}", scalar(item)),
                }
            }
        }
        _ => println!("{pad}{}", scalar(value)),
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.4}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &QuerytagArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_formatting() {
        assert_eq!(scalar(&serde_json::json!("B-BRAND")), "B-BRAND");
        assert_eq!(scalar(&serde_json::json!(3)), "3");
        assert_eq!(scalar(&serde_json::json!(0.5)), "0.5000");
        assert_eq!(scalar(&serde_json::json!(true)), "true");
    }

    #[test]
    fn test_prediction_skips_missing_sections() {
        let prediction = Prediction {
            text: "молоко".to_string(),
            spans: Some(Vec::new()),
            tokens: None,
        };
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("\"spans\":[]"));
        assert!(!json.contains("tokens"));
    }
}
