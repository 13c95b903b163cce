//! Data source abstractions for the tables being profiled

use crate::{Result, ScanError};
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// A column as described by the source catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// Type declared by the source (databases only)
    pub declared_type: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }

    pub fn with_type(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
        }
    }
}

/// One row of a table; value `i` belongs to column `i` of the catalog.
/// SQL `NULL` arrives as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl From<Vec<String>> for Row {
    fn from(values: Vec<String>) -> Self {
        Self::new(values)
    }
}

impl From<Vec<&str>> for Row {
    fn from(values: Vec<&str>) -> Self {
        Self::new(values.into_iter().map(str::to_string).collect())
    }
}

/// Stream of rows; dropping it releases the underlying cursor or file
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row>> + Send>>;

/// Produces bounded row streams for tables
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Total rows in the table, if the source can tell
    async fn row_count_estimate(&self, table: &str) -> Result<Option<i64>>;

    /// Open a stream of at most `max_rows` rows (`None` = all rows)
    async fn open_sampled_stream(&self, table: &str, max_rows: Option<u64>) -> Result<RowStream>;
}

/// Describes the tables and columns of a source
#[async_trait]
pub trait ColumnCatalog: Send + Sync {
    async fn tables(&self) -> Result<Vec<String>>;

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSpec>>;
}

/// A source the scanner can profile
pub trait TableSource: RowSource + ColumnCatalog {}

impl<T: RowSource + ColumnCatalog> TableSource for T {}

/// Delimited text files in one folder; each file is a table named after
/// the file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    folder: PathBuf,
    delimiter: u8,
    extensions: Vec<String>,
}

const CSV_CHANNEL_SIZE: usize = 1024;

impl CsvSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            delimiter: b',',
            extensions: vec!["csv".into(), "txt".into(), "tsv".into()],
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    fn path_for(&self, table: &str) -> PathBuf {
        self.folder.join(table)
    }

    fn reader(&self, path: &Path) -> Result<csv::Reader<std::fs::File>> {
        Ok(csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?)
    }
}

#[async_trait]
impl ColumnCatalog for CsvSource {
    async fn tables(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        let mut tables = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if matches && entry.file_type().await?.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    tables.push(name.to_string());
                }
            }
        }

        tables.sort();
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let path = self.path_for(table);
        let source = self.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<ColumnSpec>> {
            let mut reader = source.reader(&path)?;
            let headers = reader.headers()?;
            Ok(headers.iter().map(ColumnSpec::new).collect())
        })
        .await
        .map_err(|e| ScanError::source_error(table, e.to_string()))?
    }
}

#[async_trait]
impl RowSource for CsvSource {
    async fn row_count_estimate(&self, table: &str) -> Result<Option<i64>> {
        let path = self.path_for(table);

        // Header line excluded
        let count = tokio::task::spawn_blocking(move || -> Result<i64> {
            let file = std::fs::File::open(&path)?;
            let lines = count_record_lines(std::io::BufReader::with_capacity(1 << 16, file))?;
            debug!(path = %path.display(), lines, "counted rows");
            Ok((lines - 1).max(0))
        })
        .await
        .map_err(|e| ScanError::source_error(table, e.to_string()))??;

        Ok(Some(count))
    }

    async fn open_sampled_stream(&self, table: &str, max_rows: Option<u64>) -> Result<RowStream> {
        let path = self.path_for(table);
        // Fail here rather than inside the stream when the file is missing
        let mut reader = self.reader(&path)?;
        let (tx, rx) = mpsc::channel(CSV_CHANNEL_SIZE);
        let table = table.to_string();

        tokio::task::spawn_blocking(move || {
            let mut record = csv::StringRecord::new();
            let mut read = 0u64;

            while max_rows.map_or(true, |limit| read < limit) {
                match reader.read_record(&mut record) {
                    Ok(true) => {
                        read += 1;
                        let row = Row::new(record.iter().map(str::to_string).collect());
                        if tx.blocking_send(Ok(row)).is_err() {
                            debug!(table = %table, "row consumer went away");
                            return;
                        }
                    }
                    Ok(false) => break,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(ScanError::source_error(
                            &table,
                            format!("row {}: {}", read + 1, e),
                        )));
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Number of non-blank record lines, header included. A line break inside
/// a quoted field does not end a record. Scans raw bytes without decoding
/// fields.
fn count_record_lines(mut input: impl BufRead) -> std::io::Result<i64> {
    let mut lines = 0i64;
    let mut in_quotes = false;
    let mut has_content = false;

    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        for &byte in buf {
            match byte {
                b'"' => {
                    in_quotes = !in_quotes;
                    has_content = true;
                }
                b'\n' if !in_quotes => {
                    if has_content {
                        lines += 1;
                    }
                    has_content = false;
                }
                b'\r' if !in_quotes => {}
                _ => has_content = true,
            }
        }
        let consumed = buf.len();
        input.consume(consumed);
    }

    if has_content {
        lines += 1;
    }
    Ok(lines)
}

/// Table held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }
}

/// In-memory tables, useful for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    order: Vec<String>,
    tables: HashMap<String, MemoryTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, table: MemoryTable) {
        let name = name.into();
        if self.tables.insert(name.clone(), table).is_none() {
            self.order.push(name);
        }
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| ScanError::source_error(name, "no such table"))
    }
}

#[async_trait]
impl ColumnCatalog for MemorySource {
    async fn tables(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        Ok(self.table(table)?.columns.clone())
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn row_count_estimate(&self, table: &str) -> Result<Option<i64>> {
        Ok(Some(self.table(table)?.rows.len() as i64))
    }

    async fn open_sampled_stream(&self, table: &str, max_rows: Option<u64>) -> Result<RowStream> {
        let rows = &self.table(table)?.rows;
        let limit = max_rows.map_or(rows.len(), |n| rows.len().min(n as usize));
        let rows: Vec<Result<Row>> = rows[..limit].iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(rows)))
    }
}
