//! In-memory tabular model shared by every pipeline stage
//!
//! A [`RecordSet`] is an ordered list of column names plus rows aligned to it.
//! Readers produce one record set per input file, the aggregator concatenates
//! them into the combined table, and the normalizer and sinks consume that.

mod combine;

pub use combine::combine;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing or null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl Value {
    /// Infer a typed value from a raw text cell
    ///
    /// Empty cells become `Null`; integer and float literals become numbers;
    /// everything else stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Int(n);
        }
        if looks_numeric(trimmed) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::Text(raw.to_string())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort numeric coercion
    ///
    /// Numbers pass through, text is parsed after trimming. Anything that does
    /// not yield a finite number is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let n = match self {
            Value::Int(n) => *n as f64,
            Value::Float(f) => *f,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Null | Value::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Text rendering used for delimited output (`Null` renders empty)
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

// Accepts plain decimal and exponent notation only, so words such as "inf"
// or "NaN" stay text.
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    body.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered table of rows sharing one column list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RecordSet {
    /// Create an empty record set with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a record set from rows keyed by column name
    ///
    /// Columns are ordered by first appearance across the rows; a row that
    /// lacks a column gets `Null` there.
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut set = RecordSet::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let mut row = vec![Value::Null; set.columns.len()];
            for (key, value) in record {
                let key = key.into();
                let position = match index.get(&key) {
                    Some(&i) => i,
                    None => {
                        let i = set.columns.len();
                        index.insert(key.clone(), i);
                        set.columns.push(key);
                        for existing in &mut set.rows {
                            existing.push(Value::Null);
                        }
                        i
                    }
                };
                if row.len() <= position {
                    row.resize(position + 1, Value::Null);
                }
                row[position] = value;
            }
            row.resize(set.columns.len(), Value::Null);
            set.rows.push(row);
        }

        set
    }

    /// Append a row; it is padded or truncated to the column count
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Check if a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Value at a row and named column (`None` if the column is absent)
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let i = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[i])
    }

    /// Iterate over one column's values
    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let i = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[i]))
    }

    /// Consume into columns and rows
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    /// Rebuild from parts, padding short rows with `Null`
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut set = Self::new(columns);
        for row in rows {
            set.push_row(row);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_infer() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("  "), Value::Null);
        assert_eq!(Value::infer("70"), Value::Int(70));
        assert_eq!(Value::infer("-3"), Value::Int(-3));
        assert_eq!(Value::infer("1.5"), Value::Float(1.5));
        assert_eq!(Value::infer("2e3"), Value::Float(2000.0));
        assert_eq!(Value::infer("alice"), Value::Text("alice".to_string()));
        assert_eq!(Value::infer("NaN"), Value::Text("NaN".to_string()));
        assert_eq!(Value::infer("inf"), Value::Text("inf".to_string()));
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(Value::Int(70).as_f64(), Some(70.0));
        assert_eq!(Value::Float(1.25).as_f64(), Some(1.25));
        assert_eq!(Value::from(" 68 ").as_f64(), Some(68.0));
        assert_eq!(Value::from("tall").as_f64(), None);
        assert_eq!(Value::from("NaN").as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn test_to_field() {
        assert_eq!(Value::Null.to_field(), "");
        assert_eq!(Value::Float(1.778).to_field(), "1.778");
        assert_eq!(Value::Int(160).to_field(), "160");
        assert_eq!(Value::Bool(false).to_field(), "false");
    }

    #[test]
    fn test_from_records_outer_columns() {
        let set = RecordSet::from_records(vec![
            vec![("name", Value::from("a")), ("height", Value::Int(70))],
            vec![("name", Value::from("b")), ("weight", Value::Int(150))],
        ]);

        assert_eq!(set.columns(), &["name", "height", "weight"]);
        assert_eq!(set.row_count(), 2);
        assert_eq!(set.value(0, "weight"), Some(&Value::Null));
        assert_eq!(set.value(1, "height"), Some(&Value::Null));
        assert_eq!(set.value(1, "weight"), Some(&Value::Int(150)));
        assert_eq!(set.value(0, "missing"), None);
    }

    #[test]
    fn test_push_row_pads() {
        let mut set = RecordSet::new(vec!["a".to_string(), "b".to_string()]);
        set.push_row(vec![Value::Int(1)]);
        assert_eq!(set.rows()[0], vec![Value::Int(1), Value::Null]);
    }
}
