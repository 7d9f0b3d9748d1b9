//! Query result and catalog types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tabular query result, rows in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: f64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: vec![],
            rows: vec![],
            row_count: 0,
            execution_time_ms: 0.0,
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>, execution_time_ms: f64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms: round_ms(execution_time_ms),
        }
    }

    /// Value at `row`, `column`; `None` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// One row of `ALL_TAB_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub column_name: String,
    pub data_type: String,
    /// `"Y"` or `"N"`, as Oracle reports it.
    pub nullable: String,
    pub default_value: Option<String>,
    pub column_id: i64,
}

/// A schema object and its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub owner: String,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// Round to two decimal places.
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
