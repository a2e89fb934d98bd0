//! Delimited text reader

use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::error::ParseError;
use super::{RecordReader, open};
use crate::table::{RecordSet, Value};

/// Reader for delimited text with a header row
///
/// The first row names the columns. Short rows are padded with nulls; a row
/// with more fields than the header is an error. Cells are typed with
/// [`Value::infer`].
#[derive(Debug, Clone, Default)]
pub struct CsvReader;

impl RecordReader for CsvReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ParseError> {
        let file = open(path)?;
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let csv_error = |record: u64, e: ::csv::Error| -> ParseError {
            let message = e.to_string();
            match e.into_kind() {
                ::csv::ErrorKind::Io(io) => ParseError::from_io(path, io),
                _ => ParseError::Csv {
                    path: path.to_path_buf(),
                    record,
                    error: message,
                },
            }
        };

        let headers = reader.headers().map_err(|e| csv_error(0, e))?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ParseError::MissingHeader(path.to_path_buf()));
        }

        let mut set = RecordSet::new(dedupe_headers(&headers.iter().collect::<Vec<_>>()));
        let width = set.column_count();

        for (i, record) in reader.records().enumerate() {
            let line = i as u64 + 1;
            let record = record.map_err(|e| csv_error(line, e))?;
            if record.len() > width {
                return Err(ParseError::Csv {
                    path: path.to_path_buf(),
                    record: line,
                    error: format!("expected {} fields, found {}", width, record.len()),
                });
            }
            set.push_row(record.iter().map(Value::infer).collect());
        }

        tracing::debug!(
            path = %path.display(),
            rows = set.row_count(),
            columns = width,
            "Read delimited file"
        );
        Ok(set)
    }
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
///
/// A suffix already taken by another header in the file is skipped, so
/// `x,x.1,x` becomes `x,x.1,x.2`.
fn dedupe_headers(headers: &[&str]) -> Vec<String> {
    let original: HashSet<&str> = headers.iter().copied().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for &header in headers {
        let name = match counts.get_mut(header) {
            None => {
                counts.insert(header, 0);
                header.to_string()
            }
            Some(count) => loop {
                *count += 1;
                let candidate = format!("{}.{}", header, count);
                if !original.contains(candidate.as_str()) && !used.contains(&candidate) {
                    break candidate;
                }
            },
        };
        used.insert(name.clone());
        out.push(name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_csv_basic() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "s.csv", "name,height,weight\nann,70,160\nbo,72.5,\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert_eq!(set.columns(), &["name", "height", "weight"]);
        assert_eq!(set.row_count(), 2);
        assert_eq!(set.value(0, "height"), Some(&Value::Int(70)));
        assert_eq!(set.value(1, "height"), Some(&Value::Float(72.5)));
        assert_eq!(set.value(1, "weight"), Some(&Value::Null));
        assert_eq!(set.value(0, "name"), Some(&Value::from("ann")));
    }

    #[test]
    fn test_read_csv_quoted_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "q.csv", "name,city\n\"Doe, Jane\",\"New \"\"York\"\"\"\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert_eq!(set.value(0, "name"), Some(&Value::from("Doe, Jane")));
        assert_eq!(set.value(0, "city"), Some(&Value::from("New \"York\"")));
    }

    #[test]
    fn test_read_csv_short_row_padded() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "short.csv", "a,b,c\n1,2\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert_eq!(set.value(0, "c"), Some(&Value::Null));
    }

    #[test]
    fn test_read_csv_long_row_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "long.csv", "a,b\n1,2,3\n");

        let err = CsvReader::default().read(&path).unwrap_err();
        assert!(matches!(err, ParseError::Csv { record: 1, .. }));
    }

    #[test]
    fn test_read_csv_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.csv", "");

        let err = CsvReader::default().read(&path).unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader(_)));
    }

    #[test]
    fn test_read_csv_header_only() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "h.csv", "height,weight\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.column_count(), 2);
    }

    #[test]
    fn test_read_csv_duplicate_headers() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "dup.csv", "x,x,y,x\n1,2,3,4\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert_eq!(set.columns(), &["x", "x.1", "y", "x.2"]);
    }

    #[test]
    fn test_read_csv_duplicate_header_collision() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "taken.csv", "x,x.1,x\n1,2,3\n");

        let set = CsvReader::default().read(&path).unwrap();
        assert_eq!(set.columns(), &["x", "x.1", "x.2"]);

        // every column survives aggregation
        let combined = crate::table::combine(vec![set]);
        assert_eq!(combined.columns(), &["x", "x.1", "x.2"]);
        assert_eq!(combined.value(0, "x"), Some(&Value::Int(1)));
        assert_eq!(combined.value(0, "x.1"), Some(&Value::Int(2)));
        assert_eq!(combined.value(0, "x.2"), Some(&Value::Int(3)));
    }
}
