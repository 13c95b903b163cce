//! Report model handed to report consumers

use crate::value_index::ValueCount;
use serde::{Deserialize, Serialize};

/// Summary statistics of a column's numeric values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    /// Quartiles and deviation come from a sample rather than every value
    pub estimated: bool,
}

/// Finished profile of a single column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnReport {
    pub name: String,
    pub type_label: String,
    pub max_length: usize,
    /// Row count of the whole table, when the source knows it
    pub row_count: Option<i64>,
    pub rows_checked: u64,
    pub empty_fraction: f64,
    pub unique_count: u64,
    pub unique_count_at_least: bool,
    pub unique_fraction: f64,
    pub unique_fraction_at_least: bool,
    pub free_text: bool,
    pub values: Vec<ValueCount>,
    pub values_truncated: bool,
    pub numeric: Option<NumericSummary>,
}

/// Finished profile of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub row_count: Option<i64>,
    pub rows_checked: u64,
    /// Delimited rows skipped because their field count did not match
    pub malformed_rows: u64,
    pub columns: Vec<ColumnReport>,
}

impl TableReport {
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A table that could not be profiled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

/// Everything produced by one scan run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub tables: Vec<TableReport>,
    pub failures: Vec<TableFailure>,
}

impl ScanReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
