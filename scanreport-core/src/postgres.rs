//! PostgreSQL tables as a row source

use crate::data_source::{ColumnCatalog, ColumnSpec, Row, RowSource, RowStream};
use crate::{Result, ScanError};
use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_postgres::{NoTls, SimpleQueryMessage};
use tracing::debug;

/// Builds the statement that yields up to `limit` rows of a table
pub trait SampleQuery: Send + Sync + std::fmt::Debug {
    /// `table` is already quoted and qualified
    fn sample_query(&self, table: &str, limit: Option<u64>) -> String;
}

/// Uniformly random rows
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSample;

impl SampleQuery for RandomSample {
    fn sample_query(&self, table: &str, limit: Option<u64>) -> String {
        match limit {
            Some(n) => format!("SELECT * FROM {} ORDER BY RANDOM() LIMIT {}", table, n),
            None => format!("SELECT * FROM {}", table),
        }
    }
}

/// The first rows the server hands out; cheap on very large tables
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRows;

impl SampleQuery for FirstRows {
    fn sample_query(&self, table: &str, limit: Option<u64>) -> String {
        match limit {
            Some(n) => format!("SELECT * FROM {} LIMIT {}", table, n),
            None => format!("SELECT * FROM {}", table),
        }
    }
}

/// Sampling strategy selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    #[default]
    Random,
    FirstRows,
}

impl SamplingMethod {
    pub fn strategy(self) -> Arc<dyn SampleQuery> {
        match self {
            SamplingMethod::Random => Arc::new(RandomSample),
            SamplingMethod::FirstRows => Arc::new(FirstRows),
        }
    }
}

/// Quote an identifier for PostgreSQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Tables of one PostgreSQL schema. Connections come from a pool whose size
/// bounds the number of tables read at once.
#[derive(Clone)]
pub struct PostgresSource {
    pool: Pool,
    schema: String,
    sampling: Arc<dyn SampleQuery>,
}

impl std::fmt::Debug for PostgresSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSource")
            .field("schema", &self.schema)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl PostgresSource {
    pub fn new(connection_string: &str, schema: &str, pool_size: usize) -> Result<Self> {
        let mut config = Config::new();
        config.url = Some(connection_string.to_string());
        config.pool = Some(PoolConfig::new(pool_size.max(1)));

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ScanError::Configuration(format!("PostgreSQL pool: {}", e)))?;

        Ok(Self {
            pool,
            schema: schema.to_string(),
            sampling: Arc::new(RandomSample),
        })
    }

    pub fn with_sampling(mut self, sampling: Arc<dyn SampleQuery>) -> Self {
        self.sampling = sampling;
        self
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(table))
    }
}

#[async_trait]
impl ColumnCatalog for PostgresSource {
    async fn tables(&self) -> Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
                &[&self.schema],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
                &[&self.schema, &table],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| ColumnSpec {
                name: row.get(0),
                declared_type: row.get(1),
            })
            .collect())
    }
}

#[async_trait]
impl RowSource for PostgresSource {
    async fn row_count_estimate(&self, table: &str) -> Result<Option<i64>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(Some(row.get::<_, i64>(0)))
    }

    async fn open_sampled_stream(&self, table: &str, max_rows: Option<u64>) -> Result<RowStream> {
        let client = self.pool.get().await?;
        let sql = self.sampling.sample_query(&self.qualified(table), max_rows);
        debug!(table = %table, sql = %sql, "opening sample stream");

        // Text protocol: every column arrives as its textual rendering
        let stream = async_stream::stream! {
            let messages = match client.simple_query_raw(sql.as_str()).await {
                Ok(messages) => messages,
                Err(e) => {
                    yield Err(ScanError::from(e));
                    return;
                }
            };
            futures::pin_mut!(messages);
            while let Some(message) = messages.next().await {
                match message {
                    Ok(SimpleQueryMessage::Row(row)) => {
                        let values = (0..row.len())
                            .map(|i| row.get(i).unwrap_or_default().to_string())
                            .collect();
                        yield Ok(Row::new(values));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(ScanError::from(e));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
