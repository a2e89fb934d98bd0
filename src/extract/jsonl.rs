//! Line-delimited JSON reader

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Map;

use super::error::ParseError;
use super::{RecordReader, open};
use crate::table::{RecordSet, Value};

/// Reader for files holding one JSON object per line
///
/// Blank lines are skipped. Any other line that is not a JSON object fails
/// the whole file. Nested objects are flattened into dotted column names
/// (`{"a": {"b": 1}}` becomes column `a.b`); arrays are kept as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesReader;

impl RecordReader for JsonLinesReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ParseError> {
        let reader = BufReader::new(open(path)?);
        let mut records = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ParseError::from_io(path, e))?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            let parsed: serde_json::Value =
                serde_json::from_str(trimmed).map_err(|e| ParseError::JsonLine {
                    path: path.to_path_buf(),
                    line: index + 1,
                    error: e.to_string(),
                })?;

            let serde_json::Value::Object(object) = parsed else {
                return Err(ParseError::JsonLine {
                    path: path.to_path_buf(),
                    line: index + 1,
                    error: "expected a JSON object".to_string(),
                });
            };

            let mut fields = Vec::with_capacity(object.len());
            flatten_object("", object, &mut fields);
            records.push(fields);
        }

        let set = RecordSet::from_records(records);
        tracing::debug!(
            path = %path.display(),
            rows = set.row_count(),
            columns = set.column_count(),
            "Read line-delimited JSON file"
        );
        Ok(set)
    }
}

/// Flatten an object into `(dotted.key, value)` pairs
fn flatten_object(
    prefix: &str,
    object: Map<String, serde_json::Value>,
    out: &mut Vec<(String, Value)>,
) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            serde_json::Value::Object(nested) if !nested.is_empty() => {
                flatten_object(&name, nested, out);
            }
            other => out.push((name, scalar(other))),
        }
    }
}

fn scalar(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Object(o) if o.is_empty() => Value::Null,
        array_or_object => Value::Text(array_or_object.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_lines(dir: &TempDir, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_read_jsonl_basic() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "s.json",
            &[
                r#"{"name": "ann", "height": 72}"#,
                r#"{"name": "bo", "weight": 150.5, "active": true}"#,
            ],
        );

        let set = JsonLinesReader.read(&path).unwrap();
        assert_eq!(set.columns(), &["name", "height", "weight", "active"]);
        assert_eq!(set.value(0, "height"), Some(&Value::Int(72)));
        assert_eq!(set.value(0, "weight"), Some(&Value::Null));
        assert_eq!(set.value(1, "weight"), Some(&Value::Float(150.5)));
        assert_eq!(set.value(1, "active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_read_jsonl_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "blank.json",
            &[r#"{"id": 1}"#, "", "   ", r#"{"id": 2}"#, ""],
        );

        let set = JsonLinesReader.read(&path).unwrap();
        assert_eq!(set.row_count(), 2);
    }

    #[test]
    fn test_read_jsonl_malformed_line_fails_file() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "bad.json",
            &[r#"{"id": 1}"#, r#"{"id": 2"#, r#"{"id": 3}"#],
        );

        let err = JsonLinesReader.read(&path).unwrap_err();
        assert!(matches!(err, ParseError::JsonLine { line: 2, .. }));
    }

    #[test]
    fn test_read_jsonl_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(&dir, "scalar.json", &["42"]);

        let err = JsonLinesReader.read(&path).unwrap_err();
        assert!(matches!(err, ParseError::JsonLine { line: 1, .. }));
    }

    #[test]
    fn test_read_jsonl_flattens_nested() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(
            &dir,
            "nested.json",
            &[r#"{"id": 1, "body": {"height": 70, "dims": {"waist": 32}}, "tags": ["a", "b"], "meta": {}}"#],
        );

        let set = JsonLinesReader.read(&path).unwrap();
        assert_eq!(
            set.columns(),
            &["id", "body.height", "body.dims.waist", "tags", "meta"]
        );
        assert_eq!(set.value(0, "body.height"), Some(&Value::Int(70)));
        assert_eq!(set.value(0, "body.dims.waist"), Some(&Value::Int(32)));
        assert_eq!(set.value(0, "tags"), Some(&Value::from(r#"["a","b"]"#)));
        assert_eq!(set.value(0, "meta"), Some(&Value::Null));
    }

    #[test]
    fn test_read_jsonl_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_lines(&dir, "empty.json", &[]);

        let set = JsonLinesReader.read(&path).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.column_count(), 0);
    }
}
