//! Streaming per-column profiling: type inference, free-text detection,
//! value frequencies and optional numeric statistics.

use crate::report::{ColumnReport, NumericSummary};
use crate::reservoir::NumericReservoir;
use crate::value_index::ValueFrequencyIndex;
use crate::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Date layouts accepted by the date predicate
const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d-%b-%Y",
    "%d %b %Y",
];

/// Date-time layouts accepted by the date predicate
const DATE_TIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Per-column limits and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilerSettings {
    /// Distinct entries the value index may hold before it is trimmed
    pub max_values_in_memory: usize,
    /// Entries kept by a trim and listed in the report
    pub max_values_to_report: usize,
    /// Row count at which the free-text test runs
    pub free_text_checkpoint: u64,
    /// Average non-empty length at or above which a column is free text
    pub free_text_min_avg_length: u64,
    /// Reservoir size; `None` disables numeric statistics
    pub numeric_stats_sampler_size: Option<usize>,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            max_values_in_memory: 100_000,
            max_values_to_report: 1_000,
            free_text_checkpoint: 1_000,
            free_text_min_avg_length: 100,
            numeric_stats_sampler_size: None,
        }
    }
}

/// Whether the value index counts whole values or words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileMode {
    Typed,
    FreeText,
}

/// Accumulated statistics for one column of one table
#[derive(Debug)]
pub struct ColumnProfiler {
    name: String,
    declared_type: Option<String>,
    settings: ProfilerSettings,
    mode: ProfileMode,
    rows_processed: u64,
    empty_count: u64,
    sum_length: u64,
    max_length: usize,
    is_integer: bool,
    is_real: bool,
    is_date: bool,
    unique_count: u64,
    values: ValueFrequencyIndex,
    trimmed_during_scan: bool,
    reservoir: Option<NumericReservoir>,
    finalized: bool,
}

impl ColumnProfiler {
    pub fn new(
        name: impl Into<String>,
        declared_type: Option<String>,
        settings: ProfilerSettings,
    ) -> Result<Self> {
        let reservoir = settings
            .numeric_stats_sampler_size
            .map(NumericReservoir::new)
            .transpose()?;

        Ok(Self {
            name: name.into(),
            declared_type: declared_type.filter(|t| !t.trim().is_empty()),
            settings,
            mode: ProfileMode::Typed,
            rows_processed: 0,
            empty_count: 0,
            sum_length: 0,
            max_length: 0,
            is_integer: true,
            is_real: true,
            is_date: true,
            unique_count: 0,
            values: ValueFrequencyIndex::new(),
            trimmed_during_scan: false,
            reservoir,
            finalized: false,
        })
    }

    /// Feed one cell of this column
    pub fn observe(&mut self, raw_value: &str) {
        debug_assert!(!self.finalized, "observe called after finalize");

        let length = raw_value.chars().count();
        self.rows_processed += 1;
        self.sum_length += length as u64;
        self.max_length = self.max_length.max(length);

        let trimmed = raw_value.trim();
        if trimmed.is_empty() {
            self.empty_count += 1;
        }

        match self.mode {
            ProfileMode::Typed => {
                if self.values.add(raw_value) {
                    self.unique_count += 1;
                }
                if !trimmed.is_empty() {
                    self.narrow_types(trimmed);
                }
            }
            ProfileMode::FreeText => {
                for word in words(trimmed) {
                    self.values.add(&word);
                }
            }
        }

        if self.rows_processed == self.settings.free_text_checkpoint && self.looks_like_free_text()
        {
            debug!(
                column = %self.name,
                distinct = self.values.len(),
                "switching column to free-text profiling"
            );
            self.values = tokenize_index(&self.values);
            self.mode = ProfileMode::FreeText;
        }

        // Once a non-numeric value shows up the sample is never reported
        if self.is_numeric() {
            if let Some(reservoir) = self.reservoir.as_mut() {
                if let Some(number) = parse_number(trimmed) {
                    reservoir.add(number);
                }
            }
        }

        if self.values.len() > self.settings.max_values_in_memory
            && self.values.trim(self.settings.max_values_to_report) > 0
        {
            self.trimmed_during_scan = true;
        }
    }

    fn narrow_types(&mut self, trimmed: &str) {
        if self.is_integer && trimmed.parse::<i64>().is_err() {
            self.is_integer = false;
        }
        if self.is_real && parse_number(trimmed).is_none() {
            self.is_real = false;
        }
        if self.is_date && !is_date(trimmed) {
            self.is_date = false;
        }
    }

    fn looks_like_free_text(&self) -> bool {
        if self.is_integer || self.is_real || self.is_date {
            return false;
        }
        let non_empty = self.rows_processed - self.empty_count;
        if non_empty == 0 {
            return false;
        }
        self.sum_length / non_empty >= self.settings.free_text_min_avg_length
    }

    /// Final trim once the source is exhausted. Call exactly once.
    pub fn finalize(&mut self) {
        debug_assert!(!self.finalized, "finalize called twice");
        self.values.trim(self.settings.max_values_to_report);
        self.finalized = true;
    }

    /// One label, in precedence order: declared type, empty, text, date,
    /// int, real, varchar.
    pub fn type_label(&self) -> String {
        if let Some(declared) = &self.declared_type {
            return declared.clone();
        }
        let label = if self.rows_processed == self.empty_count {
            "empty"
        } else if self.mode == ProfileMode::FreeText {
            "text"
        } else if self.is_date {
            "date"
        } else if self.is_integer {
            "int"
        } else if self.is_real {
            "real"
        } else {
            "varchar"
        };
        label.to_string()
    }

    /// Shape the finished profile for the report consumer
    pub fn report(&self, row_count: Option<i64>, min_cell_count: u64) -> ColumnReport {
        let top = self
            .values
            .top_entries_at_least(min_cell_count, self.settings.max_values_to_report);
        let suppressed = top.entries.len() < self.values.len();
        let unique_at_least = self.trimmed_during_scan || self.is_free_text();

        ColumnReport {
            name: self.name.clone(),
            type_label: self.type_label(),
            max_length: self.max_length,
            row_count,
            rows_checked: self.rows_processed,
            empty_fraction: fraction(self.empty_count, self.rows_processed),
            unique_count: self.unique_count,
            unique_count_at_least: unique_at_least,
            unique_fraction: fraction(self.unique_count, self.rows_processed),
            unique_fraction_at_least: unique_at_least,
            free_text: self.is_free_text(),
            values_truncated: top.truncated || suppressed || self.values.is_trimmed(),
            values: top.entries,
            numeric: self.numeric_summary(),
        }
    }

    /// Statistics only for columns whose non-empty values all parsed as numbers
    fn numeric_summary(&self) -> Option<NumericSummary> {
        if !self.is_numeric() {
            return None;
        }
        let reservoir = self.reservoir.as_ref()?;
        if reservoir.is_empty() {
            return None;
        }
        let (p25, p50, p75) = reservoir.quartiles();
        Some(NumericSummary {
            min: reservoir.min(),
            max: reservoir.max(),
            mean: reservoir.mean(),
            std_dev: reservoir.std_dev(),
            p25,
            p50,
            p75,
            estimated: reservoir.is_estimate(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }

    pub fn mode(&self) -> ProfileMode {
        self.mode
    }

    pub fn is_free_text(&self) -> bool {
        self.mode == ProfileMode::FreeText
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    pub fn empty_count(&self) -> u64 {
        self.empty_count
    }

    pub fn sum_length(&self) -> u64 {
        self.sum_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn is_integer(&self) -> bool {
        self.is_integer
    }

    pub fn is_real(&self) -> bool {
        self.is_real
    }

    pub fn is_date(&self) -> bool {
        self.is_date
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer || self.is_real
    }

    pub fn unique_count(&self) -> u64 {
        self.unique_count
    }

    pub fn values(&self) -> &ValueFrequencyIndex {
        &self.values
    }

    pub fn reservoir(&self) -> Option<&NumericReservoir> {
        self.reservoir.as_ref()
    }
}

/// Rebuild a whole-value index as a word index: every retained value is
/// split into words and each word inherits the value's count.
pub fn tokenize_index(index: &ValueFrequencyIndex) -> ValueFrequencyIndex {
    let mut tokens = ValueFrequencyIndex::new();
    for (value, count) in index.iter() {
        for word in words(value.trim()) {
            tokens.add_count(&word, count);
        }
    }
    tokens
}

/// Lower-cased words of a value
pub fn words(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .unicode_words()
        .map(str::to_string)
        .collect()
}

/// Parse a finite number
pub fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DATE_TIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiler() -> ColumnProfiler {
        ColumnProfiler::new("col", None, ProfilerSettings::default()).unwrap()
    }

    fn long_text(i: usize) -> String {
        format!(
            "Patient {} reported mild discomfort after the procedure and was advised to rest for several days before returning",
            i
        )
    }

    #[test]
    fn test_integer_column() {
        let mut p = profiler();
        for v in ["1", "2", " 3 ", "-4"] {
            p.observe(v);
        }
        assert_eq!(p.type_label(), "int");
        assert!(p.is_real());
        assert!(!p.is_date());
    }

    #[test]
    fn test_real_column() {
        let mut p = profiler();
        for v in ["1.5", "2", "3e2"] {
            p.observe(v);
        }
        assert_eq!(p.type_label(), "real");
    }

    #[test]
    fn test_date_column() {
        let mut p = profiler();
        for v in ["2021-03-04", "1999-12-31", "2000-01-01 10:30:00"] {
            p.observe(v);
        }
        assert_eq!(p.type_label(), "date");
    }

    #[test]
    fn test_flags_never_come_back() {
        let mut p = profiler();
        p.observe("abc");
        assert!(!p.is_integer() && !p.is_real() && !p.is_date());
        for v in ["1", "2.0", "2020-01-01"] {
            p.observe(v);
        }
        assert!(!p.is_integer() && !p.is_real() && !p.is_date());
        assert_eq!(p.type_label(), "varchar");
    }

    #[test]
    fn test_empty_values_do_not_narrow() {
        let mut p = profiler();
        p.observe("1");
        p.observe("   ");
        p.observe("");
        assert_eq!(p.empty_count(), 2);
        assert_eq!(p.type_label(), "int");
        assert_eq!(p.values().count(""), 1);
        assert_eq!(p.values().count("   "), 1);
    }

    #[test]
    fn test_all_empty_column() {
        let mut p = profiler();
        p.observe("");
        p.observe(" ");
        assert_eq!(p.type_label(), "empty");
    }

    #[test]
    fn test_declared_type_wins() {
        let mut p =
            ColumnProfiler::new("c", Some("integer".into()), ProfilerSettings::default()).unwrap();
        p.observe("not a number");
        assert_eq!(p.type_label(), "integer");

        let p = ColumnProfiler::new("c", Some(" ".into()), ProfilerSettings::default()).unwrap();
        assert_eq!(p.declared_type(), None);
    }

    #[test]
    fn test_length_tracking() {
        let mut p = profiler();
        p.observe("héllo");
        p.observe("hi");
        assert_eq!(p.max_length(), 5);
        assert_eq!(p.sum_length(), 7);
    }

    #[test]
    fn test_free_text_switch_at_checkpoint() {
        let mut p = profiler();
        for i in 0..999 {
            p.observe(&long_text(i));
            assert!(!p.is_free_text());
        }
        p.observe(&long_text(999));
        assert!(p.is_free_text());
        assert_eq!(p.type_label(), "text");
        // Every value contained "patient" once
        assert_eq!(p.values().count("patient"), 1000);

        p.observe("Patient patient");
        assert_eq!(p.values().count("patient"), 1002);
    }

    #[test]
    fn test_short_values_stay_typed() {
        let mut p = profiler();
        for i in 0..2000 {
            p.observe(&format!("code-{}", i % 10));
        }
        assert_eq!(p.mode(), ProfileMode::Typed);
        assert_eq!(p.type_label(), "varchar");
    }

    #[test]
    fn test_free_text_never_before_checkpoint() {
        let mut p = profiler();
        for i in 0..500 {
            p.observe(&long_text(i));
        }
        p.finalize();
        assert!(!p.is_free_text());
    }

    #[test]
    fn test_tokenize_index_is_pure() {
        let mut index = ValueFrequencyIndex::new();
        index.add_count("The cat", 3);
        index.add_count("the DOG", 2);

        let tokens = tokenize_index(&index);
        assert_eq!(tokens.count("the"), 5);
        assert_eq!(tokens.count("cat"), 3);
        assert_eq!(tokens.count("dog"), 2);
        assert_eq!(index.count("The cat"), 3);
    }

    #[test]
    fn test_capacity_trim_during_scan() {
        let settings = ProfilerSettings {
            max_values_in_memory: 100,
            max_values_to_report: 10,
            ..ProfilerSettings::default()
        };
        let mut p = ColumnProfiler::new("id", None, settings).unwrap();
        for i in 0..1000 {
            p.observe(&i.to_string());
            assert!(p.values().len() <= 100);
        }
        p.finalize();

        let report = p.report(None, 0);
        assert!(report.unique_count_at_least);
        assert!(report.values_truncated);
        assert_eq!(report.values.len(), 10);
        assert_eq!(report.unique_count, 1000);
    }

    fn with_reservoir() -> ProfilerSettings {
        ProfilerSettings {
            numeric_stats_sampler_size: Some(100),
            ..ProfilerSettings::default()
        }
    }

    #[test]
    fn test_numeric_stats() {
        let mut p = ColumnProfiler::new("amount", None, with_reservoir()).unwrap();
        for v in ["1", "2", "", "3.5", " 3 "] {
            p.observe(v);
        }
        p.finalize();

        let report = p.report(Some(5), 0);
        assert_eq!(report.type_label, "real");
        let numeric = report.numeric.unwrap();
        assert_eq!(numeric.min, 1.0);
        assert_eq!(numeric.max, 3.5);
        assert_eq!(numeric.p50, 2.5);
        assert!(!numeric.estimated);
    }

    #[test]
    fn test_no_numeric_stats_for_text_columns() {
        let mut p = ColumnProfiler::new("code", None, with_reservoir()).unwrap();
        for v in ["A12", "B7", "C3", "42", "note"] {
            p.observe(v);
        }
        p.finalize();

        let report = p.report(None, 0);
        assert_eq!(report.type_label, "varchar");
        assert!(report.numeric.is_none());

        // A late non-numeric value also drops the summary
        let mut p = ColumnProfiler::new("amount", None, with_reservoir()).unwrap();
        for v in ["1", "2", "3", "x"] {
            p.observe(v);
        }
        p.finalize();
        assert!(p.report(None, 0).numeric.is_none());
    }

    #[test]
    fn test_declared_numeric_column_with_text_has_no_stats() {
        let mut p =
            ColumnProfiler::new("qty", Some("numeric".into()), with_reservoir()).unwrap();
        for v in ["10", "n/a", "30"] {
            p.observe(v);
        }
        p.finalize();

        let report = p.report(None, 0);
        assert_eq!(report.type_label, "numeric");
        assert!(report.numeric.is_none());
    }

    #[test]
    fn test_trim_that_discards_nothing_keeps_exact_counts() {
        let settings = ProfilerSettings {
            max_values_in_memory: 5,
            max_values_to_report: 10,
            ..ProfilerSettings::default()
        };
        let mut p = ColumnProfiler::new("c", None, settings).unwrap();
        for i in 0..8 {
            p.observe(&format!("v{}", i));
        }
        p.finalize();

        let report = p.report(None, 0);
        assert_eq!(report.unique_count, 8);
        assert!(!report.unique_count_at_least);
        assert!(!report.values_truncated);
        assert_eq!(report.values.len(), 8);
    }

    #[test]
    fn test_zero_reservoir_size_rejected() {
        let settings = ProfilerSettings {
            numeric_stats_sampler_size: Some(0),
            ..ProfilerSettings::default()
        };
        assert!(ColumnProfiler::new("x", None, settings).is_err());
    }

    #[test]
    fn test_min_cell_count_suppresses_rare_values() {
        let mut p = profiler();
        for v in ["a", "a", "a", "b"] {
            p.observe(v);
        }
        p.finalize();

        let report = p.report(None, 2);
        assert_eq!(report.values.len(), 1);
        assert_eq!(report.values[0].value, "a");
        assert!(report.values_truncated);
        assert!(!report.unique_count_at_least);
    }

    #[test]
    fn test_is_date_rejects_plain_numbers() {
        assert!(!is_date("12"));
        assert!(!is_date("20200101"));
        assert!(is_date("31/12/2020"));
        assert!(is_date("2020-01-01T10:00:00Z"));
    }
}
