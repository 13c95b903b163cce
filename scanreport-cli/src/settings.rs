//! YAML scan settings: where to read from, which tables, and how to profile

use anyhow::{bail, Context, Result};
use scanreport_core::{
    CsvSource, PostgresSource, SamplingMethod, ScanConfig, TableSource,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of the tables to scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSettings {
    /// A folder of delimited files, one table per file
    Csv {
        folder: PathBuf,
        #[serde(default = "default_delimiter")]
        delimiter: char,
    },
    /// A PostgreSQL schema
    Postgres {
        connection_string: String,
        #[serde(default = "default_schema")]
        schema: String,
        #[serde(default)]
        sampling: SamplingMethod,
    },
}

fn default_delimiter() -> char {
    ','
}

fn default_schema() -> String {
    "public".to_string()
}

/// Contents of a scan settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    pub source: SourceSettings,
    /// Tables to scan; empty means every table the source lists
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl ScanSettings {
    pub fn example() -> Self {
        Self {
            source: SourceSettings::Csv {
                folder: PathBuf::from("./data"),
                delimiter: default_delimiter(),
            },
            tables: Vec::new(),
            scan: ScanConfig::default(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings: ScanSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Connect to the configured source
    pub fn open_source(&self) -> Result<Arc<dyn TableSource>> {
        match &self.source {
            SourceSettings::Csv { folder, delimiter } => {
                let delimiter = delimiter_byte(*delimiter)?;
                Ok(Arc::new(CsvSource::new(folder).with_delimiter(delimiter)))
            }
            SourceSettings::Postgres {
                connection_string,
                schema,
                sampling,
            } => {
                let source = PostgresSource::new(
                    connection_string,
                    schema,
                    self.scan.max_concurrent_tables,
                )?
                .with_sampling(sampling.strategy());
                Ok(Arc::new(source))
            }
        }
    }
}

pub fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {:?}", delimiter);
    }
    Ok(delimiter as u8)
}
