//! scanreport: streaming profiler for database tables and delimited files
//!
//! Rows are pulled from a [`TableSource`] and fed cell by cell to one
//! [`ColumnProfiler`] per column. Each profiler infers a type, counts values
//! (or words, for free text) in a bounded [`ValueFrequencyIndex`] and can
//! keep a [`NumericReservoir`] for quartiles, so memory stays fixed no matter
//! how large the table is.

pub mod column_profiler;
pub mod data_source;
pub mod errors;
pub mod postgres;
pub mod progress;
pub mod report;
pub mod reservoir;
pub mod scanner;
pub mod value_index;

// Re-exports
pub use column_profiler::{ColumnProfiler, ProfileMode, ProfilerSettings};
pub use data_source::{
    ColumnCatalog, ColumnSpec, CsvSource, MemorySource, MemoryTable, Row, RowSource, RowStream,
    TableSource,
};
pub use errors::{Result, ScanError};
pub use postgres::{FirstRows, PostgresSource, RandomSample, SampleQuery, SamplingMethod};
pub use progress::{CancelFlag, Interrupter, LogProgress, NeverInterrupt, NoProgress, ProgressSink};
pub use report::{ColumnReport, NumericSummary, ScanReport, TableFailure, TableReport};
pub use reservoir::NumericReservoir;
pub use scanner::{ScanConfig, ScanOrchestrator, ScanOutcome};
pub use value_index::{TopValues, ValueCount, ValueFrequencyIndex};
