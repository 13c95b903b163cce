//! Error types for scanreport

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source error in table {table}: {message}")]
    Source { table: String, message: String },

    #[error("Scan canceled")]
    Canceled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    pub fn source_error(table: impl Into<String>, message: impl Into<String>) -> Self {
        ScanError::Source {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Cancellation is a normal termination signal, not a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ScanError::Canceled)
    }

    /// Attach a table name to a low-level error. Cancellation and errors
    /// that already carry a table pass through unchanged.
    pub fn in_table(self, table: &str) -> Self {
        match self {
            ScanError::Canceled | ScanError::Source { .. } | ScanError::Configuration(_) => self,
            other => ScanError::source_error(table, other.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for ScanError {
    fn from(err: tokio_postgres::Error) -> Self {
        ScanError::Database(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ScanError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        ScanError::Database(err.to_string())
    }
}
