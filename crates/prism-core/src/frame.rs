//! `Frame`: a small column-ordered table of JSON values.
//!
//! Parquet artifacts are read into frames, adapters turn frames into typed
//! models, and search engines hand frames back for HTML rendering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;

/// Ordered column names plus rows of JSON values.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Build a frame, rejecting rows whose width differs from the header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on a ragged row.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, CoreError> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(CoreError::Validation(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// A frame with headers and no rows.
    #[must_use]
    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column index or a `MissingColumn` error naming `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingColumn`] when the column is absent.
    pub fn require_column(&self, table: &str, name: &str) -> Result<usize, CoreError> {
        self.column_index(name)
            .ok_or_else(|| CoreError::MissingColumn {
                table: table.to_string(),
                column: name.to_string(),
            })
    }

    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Cell rendered as a string. Strings come back verbatim, numbers and
    /// booleans via their JSON text, null and missing as `None`.
    #[must_use]
    pub fn str_value(&self, row: usize, column: &str) -> Option<String> {
        self.value(row, column).and_then(value_to_string)
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the row width is wrong.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), CoreError> {
        if row.len() != self.columns.len() {
            return Err(CoreError::Validation(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Projection onto `columns`, in the given order. Unknown columns are
    /// skipped.
    #[must_use]
    pub fn select(&self, columns: &[&str]) -> Self {
        let picks: Vec<(usize, &str)> = columns
            .iter()
            .filter_map(|c| self.column_index(c).map(|i| (i, *c)))
            .collect();
        Self {
            columns: picks.iter().map(|(_, c)| (*c).to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picks.iter().map(|(i, _)| row[*i].clone()).collect())
                .collect(),
        }
    }

    /// Rows for which `keep(row_index)` is true.
    #[must_use]
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .enumerate()
                .filter(|(i, _)| keep(*i))
                .map(|(_, row)| row.clone())
                .collect(),
        }
    }
}

/// Loose string conversion used for ids and titles stored as either text or
/// numbers.
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Loose integer conversion: accepts integers, integral floats and numeric
/// strings.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[must_use]
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Frame {
        Frame::new(
            vec!["id".into(), "title".into(), "rank".into()],
            vec![
                vec![json!("1"), json!("Alpha"), json!(3.0)],
                vec![json!(2), json!("Beta"), json!(null)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Frame::new(vec!["a".into()], vec![vec![json!(1), json!(2)]]).unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn str_value_handles_numbers_and_null() {
        let f = sample();
        assert_eq!(f.str_value(0, "id").as_deref(), Some("1"));
        assert_eq!(f.str_value(1, "id").as_deref(), Some("2"));
        assert_eq!(f.str_value(1, "rank"), None);
        assert_eq!(f.str_value(0, "missing"), None);
    }

    #[test]
    fn select_keeps_requested_order_and_skips_unknown() {
        let f = sample().select(&["title", "nope", "id"]);
        assert_eq!(f.columns(), &["title".to_string(), "id".to_string()]);
        assert_eq!(f.rows()[0], vec![json!("Alpha"), json!("1")]);
    }

    #[test]
    fn filter_rows_by_index() {
        let f = sample().filter_rows(|i| i == 1);
        assert_eq!(f.len(), 1);
        assert_eq!(f.str_value(0, "title").as_deref(), Some("Beta"));
    }

    #[test]
    fn require_column_names_table() {
        let err = sample().require_column("reports", "content").unwrap_err();
        assert_eq!(err.to_string(), "Missing column 'content' in reports");
    }

    #[test]
    fn loose_integer_conversion() {
        assert_eq!(value_to_i64(&json!(4)), Some(4));
        assert_eq!(value_to_i64(&json!(4.0)), Some(4));
        assert_eq!(value_to_i64(&json!("12")), Some(12));
        assert_eq!(value_to_i64(&json!(4.5)), None);
        assert_eq!(value_to_i64(&json!(null)), None);
    }
}
