//! Training corpora: labelled queries read from JSONL or delimited CSV.
//!
//! Gold spans arrive as Python-style literal lists such as
//! `[(0, 6, 'B-TYPE'), (7, 9, 'B-VOLUME')]`. A malformed literal never
//! fails a load: that example simply carries no spans.
//!
//! ```
//! use querytag::corpus::parse_gold_spans;
//!
//! let spans = parse_gold_spans("[(0, 6, 'B-TYPE'), (7, 9, ‘B-VOLUME’)]");
//! assert_eq!(spans.len(), 2);
//! assert_eq!(spans[1].label, "B-VOLUME");
//! assert!(parse_gold_spans("not a list").is_empty());
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::GoldSpan;
use crate::error::{QuerytagError, Result};

/// One labelled query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub spans: Vec<GoldSpan>,
}

impl TrainingExample {
    pub fn new<S: Into<String>>(text: S, spans: Vec<GoldSpan>) -> Self {
        TrainingExample {
            text: text.into(),
            spans,
        }
    }
}

/// Parse a literal list of `(start, end, 'label')` tuples or lists.
///
/// Typographic quotes are normalised first. Anything that does not parse
/// yields an empty list.
pub fn parse_gold_spans(literal: &str) -> Vec<GoldSpan> {
    let trimmed = literal.trim();
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return Vec::new();
    }

    let normalized = trimmed
        .replace(['\u{2019}', '\u{2018}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");

    let parsed = literal_to_json(&normalized)
        .and_then(|json| serde_json::from_str::<Value>(&json).ok())
        .and_then(|value| spans_from_value(&value));

    match parsed {
        Some(spans) => spans,
        None => {
            debug!("Unparsable gold span literal: {literal:?}");
            Vec::new()
        }
    }
}

/// Rewrite a Python literal of tuples, lists, ints and strings as JSON.
fn literal_to_json(literal: &str) -> Option<String> {
    let mut out = String::with_capacity(literal.len() + 8);
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                let mut content = String::new();
                loop {
                    match chars.next()? {
                        '\\' => content.push(chars.next()?),
                        ch if ch == quote => break,
                        ch => content.push(ch),
                    }
                }
                out.push_str(&serde_json::to_string(&content).ok()?);
            }
            '(' => out.push('['),
            ')' | ']' => {
                // drop a trailing comma before the closer
                let kept = out.trim_end().len();
                out.truncate(kept);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(']');
            }
            other => out.push(other),
        }
    }

    Some(out)
}

fn spans_from_value(value: &Value) -> Option<Vec<GoldSpan>> {
    value
        .as_array()?
        .iter()
        .map(|item| {
            let parts = item.as_array()?;
            if parts.len() != 3 {
                return None;
            }
            let start = parts[0].as_u64()? as usize;
            let end = parts[1].as_u64()? as usize;
            let label = match &parts[2] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(GoldSpan::new(start, end, label))
        })
        .collect()
}

/// Reads `{"text": ..., "spans": ...}` objects, one per line.
///
/// `spans` may be a literal string or a JSON array of triples.
#[derive(Clone, Debug, Default)]
pub struct JsonlCorpusReader;

impl JsonlCorpusReader {
    pub fn new() -> Self {
        JsonlCorpusReader
    }

    pub fn read<R: Read>(&self, input: R) -> Result<Vec<TrainingExample>> {
        let reader = BufReader::new(input);
        let mut examples = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            examples.push(self.parse_line(&line).map_err(|e| {
                QuerytagError::corpus(format!("line {}: {e}", line_no + 1))
            })?);
        }

        Ok(examples)
    }

    fn parse_line(&self, line: &str) -> Result<TrainingExample> {
        let value: Value = serde_json::from_str(line)?;

        let Some(text) = value.get("text").and_then(Value::as_str) else {
            return Err(anyhow::anyhow!("missing string field \"text\"").into());
        };

        let spans = match value.get("spans") {
            Some(Value::String(literal)) => parse_gold_spans(literal),
            Some(array @ Value::Array(_)) => spans_from_value(array).unwrap_or_else(|| {
                debug!("Malformed span array for {text:?}");
                Vec::new()
            }),
            _ => Vec::new(),
        };

        Ok(TrainingExample::new(text, spans))
    }
}

/// Reads a delimited file with a header row.
#[derive(Clone, Debug)]
pub struct CsvCorpusReader {
    delimiter: u8,
    text_column: String,
    spans_column: String,
}

impl Default for CsvCorpusReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvCorpusReader {
    /// `;`-separated, columns `sample` and `annotation`.
    pub fn new() -> Self {
        CsvCorpusReader {
            delimiter: b';',
            text_column: "sample".to_string(),
            spans_column: "annotation".to_string(),
        }
    }

    /// Set a custom delimiter character. Only single-byte ASCII delimiters
    /// are supported.
    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() {
            return Err(QuerytagError::invalid_argument(format!(
                "delimiter {delimiter:?} is not an ASCII character"
            )));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }

    pub fn with_columns<S: Into<String>>(mut self, text: S, spans: S) -> Self {
        self.text_column = text.into();
        self.spans_column = spans.into();
        self
    }

    pub fn read<R: Read>(&self, input: R) -> Result<Vec<TrainingExample>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| QuerytagError::corpus(format!("CSV header lacks column {name:?}")))
        };
        let text_idx = column(&self.text_column)?;
        let spans_idx = column(&self.spans_column)?;

        let mut examples = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(text) = record.get(text_idx) else {
                continue;
            };
            let spans = record.get(spans_idx).map(parse_gold_spans).unwrap_or_default();
            examples.push(TrainingExample::new(text, spans));
        }

        Ok(examples)
    }
}

/// How to read a corpus file.
#[derive(Clone, Debug)]
pub struct CorpusOptions {
    pub delimiter: char,
    pub text_column: String,
    pub spans_column: String,
}

impl Default for CorpusOptions {
    fn default() -> Self {
        CorpusOptions {
            delimiter: ';',
            text_column: "sample".to_string(),
            spans_column: "annotation".to_string(),
        }
    }
}

/// Load a corpus file, choosing the reader by extension (`.jsonl`/`.json`
/// for JSON lines, anything else as delimited text).
pub fn load_corpus<P: AsRef<Path>>(path: P, options: &CorpusOptions) -> Result<Vec<TrainingExample>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        QuerytagError::corpus(format!("cannot open {}: {e}", path.display()))
    })?;

    let is_jsonl = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("json")
    );

    let examples = if is_jsonl {
        JsonlCorpusReader::new().read(file)?
    } else {
        CsvCorpusReader::new()
            .with_delimiter(options.delimiter)?
            .with_columns(options.text_column.as_str(), options.spans_column.as_str())
            .read(file)?
    };

    debug!("Loaded {} examples from {}", examples.len(), path.display());
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tuples_and_lists() {
        let spans = parse_gold_spans("[(0, 6, 'B-TYPE'), [7, 9, \"B-VOLUME\"]]");
        assert_eq!(
            spans,
            vec![GoldSpan::new(0, 6, "B-TYPE"), GoldSpan::new(7, 9, "B-VOLUME")]
        );
    }

    #[test]
    fn test_parse_smart_quotes() {
        let spans = parse_gold_spans("[(0, 5, ‘B-BRAND’), (6, 9, “O”)]");
        assert_eq!(spans[0].label, "B-BRAND");
        assert_eq!(spans[1].label, "O");
    }

    #[test]
    fn test_parse_trailing_commas() {
        let spans = parse_gold_spans("[(0, 2, 'B-TYPE',),]");
        assert_eq!(spans, vec![GoldSpan::new(0, 2, "B-TYPE")]);
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(parse_gold_spans("").is_empty());
        assert!(parse_gold_spans("[(0, 2)]").is_empty());
        assert!(parse_gold_spans("[(0, 2, 'B-TYPE')").is_empty());
        assert!(parse_gold_spans("[(-1, 2, 'B-TYPE')]").is_empty());
        assert!(parse_gold_spans("[(0, 2, 'B-TYPE]").is_empty());
        assert!(parse_gold_spans("[]").is_empty());
    }

    #[test]
    fn test_csv_reader() {
        let data = "sample;annotation\nмолоко 1л;[(0, 6, 'B-TYPE'), (7, 9, 'B-VOLUME')]\nхлеб;oops\n";
        let examples = CsvCorpusReader::new().read(data.as_bytes()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].text, "молоко 1л");
        assert_eq!(examples[0].spans.len(), 2);
        assert!(examples[1].spans.is_empty());
    }

    #[test]
    fn test_csv_reader_custom_columns() {
        let data = "query,gold\nmilk,\"[(0, 4, 'B-TYPE')]\"\n";
        let examples = CsvCorpusReader::new()
            .with_delimiter(',')
            .unwrap()
            .with_columns("query", "gold")
            .read(data.as_bytes())
            .unwrap();
        assert_eq!(examples[0].spans, vec![GoldSpan::new(0, 4, "B-TYPE")]);
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        // '¦' would truncate to 0xA6, a UTF-8 continuation byte
        let err = CsvCorpusReader::new().with_delimiter('¦').unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: Invalid argument: delimiter '¦' is not an ASCII character"
        );
        assert!(CsvCorpusReader::new().with_delimiter('\t').is_ok());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corpus.csv");
        std::fs::write(&path, "sample¦annotation\nmilk¦[]\n").unwrap();
        let options = CorpusOptions {
            delimiter: '¦',
            ..CorpusOptions::default()
        };
        assert!(load_corpus(&path, &options).is_err());
    }

    #[test]
    fn test_csv_missing_column() {
        let data = "text;spans\nmilk;[]\n";
        assert!(CsvCorpusReader::new().read(data.as_bytes()).is_err());
    }

    #[test]
    fn test_jsonl_reader() {
        let data = concat!(
            "{\"text\": \"milka 90г\", \"spans\": \"[(0, 5, 'B-BRAND')]\"}\n",
            "\n",
            "{\"text\": \"сок\", \"spans\": [[0, 3, \"B-TYPE\"]]}\n",
        );
        let examples = JsonlCorpusReader::new().read(data.as_bytes()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].spans, vec![GoldSpan::new(0, 5, "B-BRAND")]);
        assert_eq!(examples[1].spans, vec![GoldSpan::new(0, 3, "B-TYPE")]);
    }

    #[test]
    fn test_jsonl_requires_text() {
        let err = JsonlCorpusReader::new()
            .read("{\"spans\": []}\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
