//! Row-set model.
//!
//! A row is an insertion-ordered map from column (or field) name to a JSON
//! value; `serde_json` is built with `preserve_order`, so the first row's key
//! order survives all the way to CSV export.

use serde_json::{Map, Value};

/// One row or document.
pub type Row = Map<String, Value>;

/// Ordered sequence of rows.
pub type RowSet = Vec<Row>;

/// Builds a single-row row-set carrying one scalar result.
pub fn scalar_row(key: &str, value: impl Into<Value>) -> RowSet {
    let mut row = Row::new();
    row.insert(key.to_string(), value.into());
    vec![row]
}

/// Reads a scalar result back out of a row-set built by [`scalar_row`].
pub fn scalar_value<'a>(rows: &'a RowSet, key: &str) -> Option<&'a Value> {
    rows.first().and_then(|row| row.get(key))
}

/// Column names of the first row, in order.
pub fn column_names(rows: &RowSet) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_row_round_trips() {
        let rows = scalar_row("deletedCount", 3u64);
        assert_eq!(rows.len(), 1);
        assert_eq!(scalar_value(&rows, "deletedCount"), Some(&json!(3)));
        assert_eq!(scalar_value(&rows, "total"), None);
    }

    #[test]
    fn test_column_names_keep_first_row_order() {
        let rows: RowSet = vec![
            serde_json::from_value(json!({"zeta": 1, "alpha": 2, "mid": 3})).unwrap(),
            serde_json::from_value(json!({"other": 1})).unwrap(),
        ];
        assert_eq!(column_names(&rows), vec!["zeta", "alpha", "mid"]);
        assert!(column_names(&Vec::new()).is_empty());
    }
}
