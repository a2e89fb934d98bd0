//! Rename and unit-conversion rules

use serde::{Deserialize, Serialize};

use crate::table::{RecordSet, Value};

/// Inches to meters
pub const HEIGHT_INCHES_TO_METERS: f64 = 0.0254;
/// Pounds to kilograms
pub const WEIGHT_POUNDS_TO_KG: f64 = 0.453592;

/// Rename a column if it is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameRule {
    /// Column name in the combined table
    pub from: String,
    /// Column name after normalization
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Derive `target = source * factor` if `source` is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    /// Column holding the original measurement
    pub source: String,
    /// Derived column
    pub target: String,
    /// Multiplier applied to the numeric source value
    pub factor: f64,
}

impl UnitConversion {
    pub fn new(source: impl Into<String>, target: impl Into<String>, factor: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            factor,
        }
    }
}

/// Schema normalizer
///
/// Renames run first, in order, then conversions. Renamed columns keep their
/// position; a derived column is appended when new and overwritten in place
/// when it already exists, so applying the normalizer to its own output
/// changes nothing. Values that do not coerce to a finite number produce a
/// null derived value instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub renames: Vec<RenameRule>,
    pub conversions: Vec<UnitConversion>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            renames: vec![
                RenameRule::new("height", "height_inches"),
                RenameRule::new("weight", "weight_pounds"),
            ],
            conversions: vec![
                UnitConversion::new("height_inches", "height_meters", HEIGHT_INCHES_TO_METERS),
                UnitConversion::new("weight_pounds", "weight_kg", WEIGHT_POUNDS_TO_KG),
            ],
        }
    }
}

impl Normalizer {
    /// Create a normalizer with custom rules
    pub fn new(renames: Vec<RenameRule>, conversions: Vec<UnitConversion>) -> Self {
        Self {
            renames,
            conversions,
        }
    }

    /// Normalize a table, returning the new table
    pub fn apply(&self, table: RecordSet) -> RecordSet {
        let (mut columns, mut rows) = table.into_parts();

        for rule in &self.renames {
            rename_column(&mut columns, &mut rows, rule);
        }
        for conversion in &self.conversions {
            derive_column(&mut columns, &mut rows, conversion);
        }

        RecordSet::from_parts(columns, rows)
    }
}

/// Normalize with the default rules
pub fn normalize(table: RecordSet) -> RecordSet {
    Normalizer::default().apply(table)
}

fn rename_column(columns: &mut Vec<String>, rows: &mut [Vec<Value>], rule: &RenameRule) {
    let Some(from) = columns.iter().position(|c| *c == rule.from) else {
        return;
    };

    match columns.iter().position(|c| *c == rule.to) {
        None => columns[from] = rule.to.clone(),
        Some(to) => {
            // Both names present: the target keeps its values and the source
            // only fills its gaps.
            for row in rows.iter_mut() {
                let value = row.remove(from);
                let target = if to > from { to - 1 } else { to };
                if row[target].is_null() {
                    row[target] = value;
                }
            }
            columns.remove(from);
        }
    }
}

fn derive_column(columns: &mut Vec<String>, rows: &mut [Vec<Value>], conversion: &UnitConversion) {
    let Some(source) = columns.iter().position(|c| *c == conversion.source) else {
        return;
    };

    let derived = |row: &Vec<Value>| -> Value {
        row[source]
            .as_f64()
            .map(|n| Value::Float(n * conversion.factor))
            .unwrap_or(Value::Null)
    };

    match columns.iter().position(|c| *c == conversion.target) {
        Some(target) => {
            for row in rows.iter_mut() {
                row[target] = derived(row);
            }
        }
        None => {
            columns.push(conversion.target.clone());
            for row in rows.iter_mut() {
                let value = derived(row);
                row.push(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn float(set: &RecordSet, row: usize, column: &str) -> Option<f64> {
        match set.value(row, column)? {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[test]
    fn test_renames_and_derives() {
        let table = RecordSet::from_records(vec![vec![
            ("name", Value::from("ann")),
            ("height", Value::Int(70)),
            ("weight", Value::Int(160)),
        ]]);

        let out = normalize(table);
        assert_eq!(
            out.columns(),
            &[
                "name",
                "height_inches",
                "weight_pounds",
                "height_meters",
                "weight_kg"
            ]
        );
        assert!((float(&out, 0, "height_meters").unwrap() - 1.778).abs() < TOLERANCE);
        assert!((float(&out, 0, "weight_kg").unwrap() - 72.57472).abs() < TOLERANCE);
        assert_eq!(out.value(0, "height_inches"), Some(&Value::Int(70)));
    }

    #[test]
    fn test_text_values_coerced() {
        let table = RecordSet::from_records(vec![
            vec![("height", Value::from("68"))],
            vec![("height", Value::from("tall"))],
            vec![("height", Value::Null)],
        ]);

        let out = normalize(table);
        assert!((float(&out, 0, "height_meters").unwrap() - 1.7272).abs() < TOLERANCE);
        assert_eq!(out.value(1, "height_meters"), Some(&Value::Null));
        assert_eq!(out.value(2, "height_meters"), Some(&Value::Null));
        assert_eq!(out.row_count(), 3, "bad values must not drop rows");
    }

    #[test]
    fn test_missing_source_column_is_not_an_error() {
        let table = RecordSet::from_records(vec![vec![("height", Value::Int(72))]]);

        let out = normalize(table);
        assert!(!out.has_column("weight_pounds"));
        assert!(!out.has_column("weight_kg"));
        assert!(out.has_column("height_meters"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let table = RecordSet::from_records(vec![
            vec![("height", Value::Int(70)), ("weight", Value::from("160"))],
            vec![("height", Value::from("x")), ("weight", Value::Null)],
        ]);

        let once = normalize(table);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rename_merges_into_existing_target() {
        let table = RecordSet::from_records(vec![
            vec![("height_inches", Value::Int(60)), ("height", Value::Int(70))],
            vec![("height_inches", Value::Null), ("height", Value::Int(72))],
        ]);

        let out = normalize(table);
        assert_eq!(out.columns(), &["height_inches", "height_meters"]);
        assert_eq!(out.value(0, "height_inches"), Some(&Value::Int(60)));
        assert_eq!(out.value(1, "height_inches"), Some(&Value::Int(72)));
    }

    #[test]
    fn test_custom_rules() {
        let normalizer = Normalizer::new(
            vec![RenameRule::new("dist", "dist_miles")],
            vec![UnitConversion::new("dist_miles", "dist_km", 1.609344)],
        );
        let table = RecordSet::from_records(vec![vec![("dist", Value::Float(10.0))]]);

        let out = normalizer.apply(table);
        assert!((float(&out, 0, "dist_km").unwrap() - 16.09344).abs() < TOLERANCE);
    }
}
