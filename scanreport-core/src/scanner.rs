//! Scan orchestration: one worker per table, bounded by a semaphore, with a
//! single collector for finished tables.

use crate::column_profiler::{ColumnProfiler, ProfilerSettings};
use crate::data_source::TableSource;
use crate::progress::{Interrupter, NeverInterrupt, NoProgress, ProgressSink};
use crate::report::{ScanReport, TableFailure, TableReport};
use crate::{Result, ScanError};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

/// Settings for one scan run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Rows examined per table; -1 scans everything
    pub sample_size: i64,
    /// Collect min/max/mean/quartiles for numeric values
    pub calculate_numeric_stats: bool,
    /// Reservoir size used for quartiles
    pub numeric_stats_sampler_size: usize,
    /// Distinct values kept in memory per column before trimming
    pub max_values_in_memory: usize,
    /// Values listed per column in the report
    pub max_values_to_report: usize,
    /// Values seen fewer times than this are left out of the report
    pub min_cell_count: u64,
    /// Row at which a column is tested for free text
    pub free_text_checkpoint: u64,
    /// Average length that makes a column free text
    pub free_text_min_avg_length: u64,
    /// Tables profiled at the same time
    pub max_concurrent_tables: usize,
    /// Rows between cancellation checks
    pub interrupt_check_interval: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_size: 100_000,
            calculate_numeric_stats: false,
            numeric_stats_sampler_size: 500,
            max_values_in_memory: 100_000,
            max_values_to_report: 1_000,
            min_cell_count: 0,
            free_text_checkpoint: 1_000,
            free_text_min_avg_length: 100,
            max_concurrent_tables: num_cpus::get().min(4),
            interrupt_check_interval: 1_000,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size < -1 {
            return Err(ScanError::Configuration(format!(
                "sample_size must be -1 or a row count, got {}",
                self.sample_size
            )));
        }
        if self.calculate_numeric_stats && self.numeric_stats_sampler_size == 0 {
            return Err(ScanError::Configuration(
                "numeric_stats_sampler_size must be greater than zero".into(),
            ));
        }
        if self.max_values_to_report == 0 {
            return Err(ScanError::Configuration(
                "max_values_to_report must be greater than zero".into(),
            ));
        }
        if self.max_values_in_memory < self.max_values_to_report {
            return Err(ScanError::Configuration(
                "max_values_in_memory must be at least max_values_to_report".into(),
            ));
        }
        if self.max_concurrent_tables == 0 {
            return Err(ScanError::Configuration(
                "max_concurrent_tables must be greater than zero".into(),
            ));
        }
        if self.interrupt_check_interval == 0 {
            return Err(ScanError::Configuration(
                "interrupt_check_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Row cap per table; `None` when unbounded
    pub fn row_limit(&self) -> Option<u64> {
        if self.sample_size < 0 {
            None
        } else {
            Some(self.sample_size as u64)
        }
    }

    pub fn profiler_settings(&self) -> ProfilerSettings {
        ProfilerSettings {
            max_values_in_memory: self.max_values_in_memory,
            max_values_to_report: self.max_values_to_report,
            free_text_checkpoint: self.free_text_checkpoint,
            free_text_min_avg_length: self.free_text_min_avg_length,
            numeric_stats_sampler_size: self
                .calculate_numeric_stats
                .then_some(self.numeric_stats_sampler_size),
        }
    }
}

/// How a scan ended
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// Cancellation was requested; holds the tables finished before that
    Canceled { completed: ScanReport },
}

impl ScanOutcome {
    pub fn is_canceled(&self) -> bool {
        matches!(self, ScanOutcome::Canceled { .. })
    }

    pub fn report(&self) -> &ScanReport {
        match self {
            ScanOutcome::Completed(report) => report,
            ScanOutcome::Canceled { completed } => completed,
        }
    }

    pub fn into_report(self) -> ScanReport {
        match self {
            ScanOutcome::Completed(report) => report,
            ScanOutcome::Canceled { completed } => completed,
        }
    }
}

/// Profiles the tables of one source
pub struct ScanOrchestrator {
    source: Arc<dyn TableSource>,
    config: ScanConfig,
    interrupter: Arc<dyn Interrupter>,
    progress: Arc<dyn ProgressSink>,
}

impl ScanOrchestrator {
    pub fn new(source: Arc<dyn TableSource>, config: ScanConfig) -> Self {
        Self {
            source,
            config,
            interrupter: Arc::new(NeverInterrupt),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_interrupter(mut self, interrupter: Arc<dyn Interrupter>) -> Self {
        self.interrupter = interrupter;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Profile `tables` and collect their reports in request order. Tables
    /// that fail are logged and listed in [`ScanReport::failures`].
    pub async fn scan(&self, tables: &[String]) -> Result<ScanOutcome> {
        self.config.validate()?;
        if tables.is_empty() {
            return Err(ScanError::Configuration("no tables to scan".into()));
        }

        info!(
            "Starting scan of {} tables (sample size {}, {} at a time)",
            tables.len(),
            self.config.sample_size,
            self.config.max_concurrent_tables
        );
        self.progress.set_total(tables.len());

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_tables));
        let (tx, mut rx) = mpsc::channel(tables.len());
        let mut handles = Vec::with_capacity(tables.len());
        let mut canceled = false;

        for (idx, table) in tables.iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ScanError::Configuration(format!("Semaphore error: {}", e)))?;

            if self.interrupter.check_interrupted().is_err() {
                canceled = true;
                break;
            }

            let worker = TableWorker {
                source: self.source.clone(),
                config: self.config.clone(),
                interrupter: self.interrupter.clone(),
            };
            let tx = tx.clone();
            let name = table.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit; // Hold permit until done
                let result = worker.profile_table(&name).await;
                let _ = tx.send((idx, name, result)).await;
            });
            handles.push((table.clone(), handle));
        }
        drop(tx);

        let mut finished: Vec<(usize, TableReport)> = Vec::new();
        let mut report = ScanReport::default();

        while let Some((idx, table, result)) = rx.recv().await {
            match result {
                Ok(Some(table_report)) => {
                    info!(
                        "Finished table {}: {} rows checked, {} columns",
                        table,
                        table_report.rows_checked,
                        table_report.columns.len()
                    );
                    finished.push((idx, table_report));
                    self.progress.advance();
                }
                Ok(None) => {
                    info!("Table {} has no columns or rows; left out of the report", table);
                    self.progress.advance();
                }
                Err(e) if e.is_canceled() => {
                    info!("Scan of table {} canceled", table);
                    canceled = true;
                }
                Err(e) => {
                    warn!("Skipping table {}: {}", table, e);
                    report.failures.push(TableFailure {
                        table,
                        error: e.to_string(),
                    });
                    self.progress.advance();
                }
            }
        }

        for (table, handle) in handles {
            if let Err(e) = handle.await {
                error!("Worker for table {} did not finish: {}", table, e);
                report.failures.push(TableFailure {
                    table,
                    error: format!("worker failed: {}", e),
                });
            }
        }

        finished.sort_by_key(|(idx, _)| *idx);
        report.tables = finished.into_iter().map(|(_, t)| t).collect();

        if canceled {
            info!("Scan canceled after {} tables", report.tables.len());
            Ok(ScanOutcome::Canceled { completed: report })
        } else {
            info!(
                "Scan complete: {} tables reported, {} failed",
                report.tables.len(),
                report.failures.len()
            );
            Ok(ScanOutcome::Completed(report))
        }
    }
}

/// Everything one table's worker owns
struct TableWorker {
    source: Arc<dyn TableSource>,
    config: ScanConfig,
    interrupter: Arc<dyn Interrupter>,
}

impl TableWorker {
    /// `Ok(None)` for tables with no columns or no rows
    async fn profile_table(&self, table: &str) -> Result<Option<TableReport>> {
        self.interrupter.check_interrupted()?;
        debug!(table = %table, "profiling table");

        let columns = self
            .source
            .columns(table)
            .await
            .map_err(|e| e.in_table(table))?;
        if columns.is_empty() {
            return Ok(None);
        }

        let row_count = match self.source.row_count_estimate(table).await {
            Ok(count) => count,
            Err(e) if e.is_canceled() => return Err(e),
            Err(e) => {
                warn!("Could not count rows of {}: {}", table, e);
                None
            }
        };

        let settings = self.config.profiler_settings();
        let mut profilers = columns
            .iter()
            .map(|c| ColumnProfiler::new(c.name.clone(), c.declared_type.clone(), settings.clone()))
            .collect::<Result<Vec<_>>>()?;

        let limit = self.config.row_limit();
        let mut stream = self
            .source
            .open_sampled_stream(table, limit)
            .await
            .map_err(|e| e.in_table(table))?;

        let mut rows_read = 0u64;
        let mut rows_checked = 0u64;
        let mut malformed_rows = 0u64;

        while limit.map_or(true, |l| rows_read < l) {
            let row = match stream.next().await {
                Some(row) => row.map_err(|e| row_error(table, rows_read + 1, e))?,
                None => break,
            };
            rows_read += 1;

            if rows_read % self.config.interrupt_check_interval == 0 {
                self.interrupter.check_interrupted()?;
            }

            if row.len() != profilers.len() {
                malformed_rows += 1;
                debug!(
                    table = %table,
                    row = rows_read,
                    fields = row.len(),
                    expected = profilers.len(),
                    "skipping row with wrong field count"
                );
                continue;
            }

            for (profiler, value) in profilers.iter_mut().zip(row.values()) {
                profiler.observe(value);
            }
            rows_checked += 1;
        }
        drop(stream);

        if malformed_rows > 0 {
            warn!("Skipped {} malformed rows in {}", malformed_rows, table);
        }
        if rows_checked == 0 {
            return Ok(None);
        }

        for profiler in &mut profilers {
            profiler.finalize();
        }

        Ok(Some(TableReport {
            table: table.to_string(),
            row_count,
            rows_checked,
            malformed_rows,
            columns: profilers
                .iter()
                .map(|p| p.report(row_count, self.config.min_cell_count))
                .collect(),
        }))
    }
}

fn row_error(table: &str, row: u64, err: ScanError) -> ScanError {
    match err {
        ScanError::Canceled | ScanError::Source { .. } => err,
        other => ScanError::source_error(table, format!("row {}: {}", row, other)),
    }
}
