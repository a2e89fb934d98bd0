//! Outer-union concatenation of record sets

use std::collections::HashMap;

use super::{RecordSet, Value};

/// Concatenate record sets into one combined table
///
/// The column list is the union of all inputs in first-appearance order.
/// Rows keep the order of the input list and, within each input, their own
/// order; a column a row's source did not produce is `Null`.
pub fn combine(sets: Vec<RecordSet>) -> RecordSet {
    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for set in &sets {
        for column in set.columns() {
            if !index.contains_key(column) {
                index.insert(column.clone(), columns.len());
                columns.push(column.clone());
            }
        }
    }

    let total_rows = sets.iter().map(RecordSet::row_count).sum();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total_rows);

    for set in sets {
        let (set_columns, set_rows) = set.into_parts();
        let mapping: Vec<usize> = set_columns.iter().map(|c| index[c]).collect();

        for row in set_rows {
            let mut combined = vec![Value::Null; columns.len()];
            for (value, &target) in row.into_iter().zip(&mapping) {
                combined[target] = value;
            }
            rows.push(combined);
        }
    }

    RecordSet::from_parts(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(records: Vec<Vec<(&str, Value)>>) -> RecordSet {
        RecordSet::from_records(records)
    }

    #[test]
    fn test_combine_outer_union() {
        let csv = set(vec![vec![
            ("height", Value::Int(70)),
            ("weight", Value::Int(160)),
        ]]);
        let json = set(vec![vec![("height", Value::Int(72)), ("name", "bo".into())]]);
        let xml = set(vec![vec![("height", "68".into())]]);

        let combined = combine(vec![csv, json, xml]);

        assert_eq!(combined.columns(), &["height", "weight", "name"]);
        assert_eq!(combined.row_count(), 3);
        assert_eq!(combined.value(0, "weight"), Some(&Value::Int(160)));
        assert_eq!(combined.value(1, "weight"), Some(&Value::Null));
        assert_eq!(combined.value(1, "name"), Some(&Value::from("bo")));
        assert_eq!(combined.value(2, "height"), Some(&Value::from("68")));
        assert_eq!(combined.value(2, "name"), Some(&Value::Null));
    }

    #[test]
    fn test_combine_preserves_order() {
        let a = set(vec![
            vec![("id", Value::Int(1))],
            vec![("id", Value::Int(2))],
        ]);
        let b = set(vec![vec![("id", Value::Int(3))]]);
        let c = set(vec![
            vec![("id", Value::Int(4))],
            vec![("id", Value::Int(5))],
        ]);

        let combined = combine(vec![a, b, c]);
        let ids: Vec<_> = combined.column_values("id").unwrap().cloned().collect();
        assert_eq!(
            ids,
            (1..=5).map(Value::Int).collect::<Vec<_>>(),
            "rows must follow input list order"
        );
    }

    #[test]
    fn test_combine_row_count_is_sum() {
        let sets: Vec<RecordSet> = (0..9)
            .map(|i| {
                set((0..i)
                    .map(|j| vec![("n", Value::Int(j))])
                    .collect())
            })
            .collect();
        let expected: usize = sets.iter().map(RecordSet::row_count).sum();

        assert_eq!(combine(sets).row_count(), expected);
    }

    #[test]
    fn test_combine_empty() {
        let combined = combine(Vec::new());
        assert!(combined.is_empty());
        assert_eq!(combined.column_count(), 0);
    }
}
